use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub type NoteId = String;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    Voice,
    #[default]
    Text,
    Collection,
}

impl NoteType {
    pub fn label(&self) -> &'static str {
        match self {
            NoteType::Voice => "voice",
            NoteType::Text => "text",
            NoteType::Collection => "collection",
        }
    }

    pub fn parse(raw: &str) -> Option<NoteType> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "voice" => Some(NoteType::Voice),
            "text" => Some(NoteType::Text),
            "collection" => Some(NoteType::Collection),
            _ => None,
        }
    }
}

/// Backend-owned note record. The board only ever holds a cached copy.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoteType,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub manually_positioned: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ai_suggested_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_duration: Option<u32>,
}

/// Body of a create call. The backend assigns the id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: NoteType,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manually_positioned: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FieldsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FieldsPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    #[error("note not found: {0}")]
    NoteNotFound(String),
    #[error("invalid date format (use YYYY-MM-DD HH:MM): {0}")]
    InvalidDate(String),
    #[error("unknown note type: {0}")]
    InvalidType(String),
    #[error("cannot merge note {0} into itself")]
    SelfMerge(String),
}

impl Note {
    /// Calendar date of the note as seen from `offset`.
    pub fn local_date(&self, offset: &FixedOffset) -> NaiveDate {
        self.date.with_timezone(offset).date_naive()
    }

    pub fn local_time_label(&self, offset: &FixedOffset) -> String {
        self.date.with_timezone(offset).format("%H:%M").to_string()
    }
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>, date: DateTime<Utc>) -> Self {
        NewNote {
            title: title.into(),
            content: content.into(),
            kind: NoteType::Text,
            date,
            x: None,
            y: None,
            manually_positioned: None,
            tags: Vec::new(),
        }
    }
}

/// Deduplicates tags keeping first-seen order.
pub fn union_tags(first: &[String], second: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(first.len() + second.len());
    for tag in first.iter().chain(second.iter()) {
        if !merged.iter().any(|t| t == tag) {
            merged.push(tag.clone());
        }
    }
    merged
}

/// Parses `YYYY-MM-DD HH:MM` (or a bare `YYYY-MM-DD`) in the given offset.
pub fn parse_local_datetime(raw: &str, offset: &FixedOffset) -> Result<DateTime<Utc>, BoardError> {
    let raw = raw.trim();
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| BoardError::InvalidDate(raw.to_string()))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| BoardError::InvalidDate(raw.to_string()))
}
