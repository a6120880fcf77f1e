use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::{EventId, MediaEntityId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum MediaEventKind {
    Create,
    Delete,
}

impl MediaEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaEventKind::Create => "CREATE",
            MediaEventKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for MediaEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaEventKind {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "CREATE" => Ok(MediaEventKind::Create),
            "DELETE" => Ok(MediaEventKind::Delete),
            other => Err(ModelError::InvalidEventKind(other.to_string())),
        }
    }
}

/// Append-only change-log entry consumed by clients for incremental sync.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaEvent {
    pub id: EventId,
    pub kind: MediaEventKind,
    pub relative_path: String,
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub entity_id: Option<MediaEntityId>,
    pub occurred_at: DateTime<Utc>,
}

impl MediaEvent {
    pub fn created(relative_path: impl Into<String>, entity_id: MediaEntityId) -> Self {
        Self {
            id: EventId::new(),
            kind: MediaEventKind::Create,
            relative_path: relative_path.into(),
            entity_id: Some(entity_id),
            occurred_at: Utc::now(),
        }
    }

    pub fn deleted(relative_path: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            kind: MediaEventKind::Delete,
            relative_path: relative_path.into(),
            entity_id: None,
            occurred_at: Utc::now(),
        }
    }
}
