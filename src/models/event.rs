//! The single wedding event that owns every media record.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// Event details, supplied by configuration and read-only at runtime.
#[derive(Clone)]
pub struct EventConfig {
    /// Identifier stored on every media record (`media.event_id`).
    pub id: String,

    /// Display name, e.g. "Roberta & Michael's Wedding".
    pub name: String,

    /// Wedding day.
    pub date: NaiveDate,

    /// Code guests use on their upload link.
    pub access_code: String,

    /// Code embedded in the couple's dashboard link.
    pub admin_code: String,
}

impl EventConfig {
    /// Public projection without either access code.
    pub fn info(&self) -> EventInfo {
        EventInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            date: self.date,
            date_label: self.date.format("%A, %B %-d, %Y").to_string(),
        }
    }

    /// Resolve an access code to the role it grants.
    pub fn role_for_code(&self, code: &str) -> Option<EventRole> {
        if !self.admin_code.is_empty() && code == self.admin_code {
            Some(EventRole::Admin)
        } else if !self.access_code.is_empty() && code == self.access_code {
            Some(EventRole::Guest)
        } else {
            None
        }
    }

    /// Suggested name for the bulk download.
    pub fn archive_file_name(&self) -> String {
        let name = if self.name.trim().is_empty() {
            "Wedding"
        } else {
            self.name.as_str()
        };
        format!("{name}-memories.zip")
    }
}

impl fmt::Debug for EventConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("date", &self.date)
            .field("access_code", &"<redacted>")
            .field("admin_code", &"<redacted>")
            .finish()
    }
}

/// What an event looks like to anyone holding a link.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct EventInfo {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    /// Long form, e.g. "Saturday, June 21, 2025".
    pub date_label: String,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventRole {
    Guest,
    Admin,
}
