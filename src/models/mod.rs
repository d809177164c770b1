//! Core data models for the wedding media service.
//!
//! Records map to the `media` table via `sqlx::FromRow` and serialize as JSON
//! via `serde`. The event itself is configuration, not a table.

pub mod event;
pub mod media;
