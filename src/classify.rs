//! File classification for guest contributions.
//!
//! Every place that needs to know "what kind of thing is this" (dashboard
//! labels, category filters, stats, the archive builder) goes through
//! [`classify`], so the answer is the same everywhere.
//!
//! Precedence lives in [`CLASSIFICATION_RULES`]: the first rule whose
//! predicate matches decides the category.

use crate::models::media::MediaRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// File name stored on message-only records. Such records have no backing object.
pub const MESSAGE_ONLY_SENTINEL: &str = "Message Only";

/// Substring carried by every clip produced by the in-app voice recorder.
pub const VOICE_MESSAGE_MARKER: &str = "voice-message-";

/// Container type of recorded voice clips.
pub const VOICE_CONTENT_TYPE: &str = "audio/webm";

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];
pub const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "ogg", "webm"];

/// Display category of a media record.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MediaCategory {
    Message,
    VoiceMessage,
    Image,
    Video,
    Audio,
    File,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 6] = [
        MediaCategory::Message,
        MediaCategory::VoiceMessage,
        MediaCategory::Image,
        MediaCategory::Video,
        MediaCategory::Audio,
        MediaCategory::File,
    ];

    /// Human-facing label used on dashboard cards.
    pub fn label(self) -> &'static str {
        match self {
            MediaCategory::Message => "Message",
            MediaCategory::VoiceMessage => "Voice Message",
            MediaCategory::Image => "Photo",
            MediaCategory::Video => "Video",
            MediaCategory::Audio => "Audio",
            MediaCategory::File => "File",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Message => "message",
            MediaCategory::VoiceMessage => "voice-message",
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::File => "file",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for MediaCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Predicate over `(file name, declared content type)`.
pub type RulePredicate = fn(&str, Option<&str>) -> bool;

/// One row of the precedence table.
#[derive(Clone, Copy)]
pub struct ClassificationRule {
    pub name: &'static str,
    pub matches: RulePredicate,
    pub category: MediaCategory,
}

/// Ordered rule table. `webm` appears in both the video and audio sets; the
/// voice rule sits above both so recorded clips never fall through to them.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "message-only sentinel",
        matches: is_message_only,
        category: MediaCategory::Message,
    },
    ClassificationRule {
        name: "recorded voice clip",
        matches: is_voice_clip,
        category: MediaCategory::VoiceMessage,
    },
    ClassificationRule {
        name: "image extension",
        matches: has_image_extension,
        category: MediaCategory::Image,
    },
    ClassificationRule {
        name: "video extension",
        matches: has_video_extension,
        category: MediaCategory::Video,
    },
    ClassificationRule {
        name: "audio extension",
        matches: has_audio_extension,
        category: MediaCategory::Audio,
    },
];

/// Classify a file by name and optional declared content type.
///
/// A missing name is a generic file.
pub fn classify(name: Option<&str>, declared_type: Option<&str>) -> MediaCategory {
    let Some(name) = name else {
        return MediaCategory::File;
    };

    CLASSIFICATION_RULES
        .iter()
        .find(|rule| (rule.matches)(name, declared_type))
        .map(|rule| rule.category)
        .unwrap_or(MediaCategory::File)
}

/// Classify a stored record.
pub fn classify_record(record: &MediaRecord) -> MediaCategory {
    classify(Some(&record.file_name), Some(&record.file_type))
}

fn is_message_only(name: &str, _declared: Option<&str>) -> bool {
    name == MESSAGE_ONLY_SENTINEL
}

fn is_voice_clip(name: &str, declared: Option<&str>) -> bool {
    name.contains(VOICE_MESSAGE_MARKER) || declared == Some(VOICE_CONTENT_TYPE)
}

fn has_image_extension(name: &str, _declared: Option<&str>) -> bool {
    extension_in(name, &IMAGE_EXTENSIONS)
}

fn has_video_extension(name: &str, _declared: Option<&str>) -> bool {
    extension_in(name, &VIDEO_EXTENSIONS)
}

fn has_audio_extension(name: &str, _declared: Option<&str>) -> bool {
    extension_in(name, &AUDIO_EXTENSIONS)
}

/// Lowercased text after the last `.`, if any.
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn extension_in(name: &str, set: &[&str]) -> bool {
    extension_of(name).is_some_and(|ext| set.contains(&ext.as_str()))
}

/// Per-category totals. Each record lands in exactly one counter.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub messages: usize,
    pub voice_messages: usize,
    pub images: usize,
    pub videos: usize,
    pub audio: usize,
    pub files: usize,
}

impl CategoryCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a MediaRecord>) -> Self {
        records
            .into_iter()
            .map(classify_record)
            .fold(Self::default(), |mut counts, category| {
                counts.add(category);
                counts
            })
    }

    pub fn add(&mut self, category: MediaCategory) {
        match category {
            MediaCategory::Message => self.messages += 1,
            MediaCategory::VoiceMessage => self.voice_messages += 1,
            MediaCategory::Image => self.images += 1,
            MediaCategory::Video => self.videos += 1,
            MediaCategory::Audio => self.audio += 1,
            MediaCategory::File => self.files += 1,
        }
    }

    pub fn get(&self, category: MediaCategory) -> usize {
        match category {
            MediaCategory::Message => self.messages,
            MediaCategory::VoiceMessage => self.voice_messages,
            MediaCategory::Image => self.images,
            MediaCategory::Video => self.videos,
            MediaCategory::Audio => self.audio,
            MediaCategory::File => self.files,
        }
    }

    pub fn total(&self) -> usize {
        MediaCategory::ALL.into_iter().map(|c| self.get(c)).sum()
    }
}

/// Format a byte count in base-1024 units, e.g. `1.5 KB`.
pub fn format_file_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes <= 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
