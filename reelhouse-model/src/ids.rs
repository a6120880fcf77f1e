use std::fmt;

use uuid::Uuid;

use crate::error::ModelError;

/// Strongly typed ID for catalogued media entities
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaEntityId(pub Uuid);

impl Default for MediaEntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEntityId {
    pub fn new() -> Self {
        MediaEntityId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MediaEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed ID for change-log entries. v7 keeps them time ordered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(pub Uuid);

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl EventId {
    pub fn new() -> Self {
        EventId(Uuid::now_v7())
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transcode job identifier. Doubles as the executor-side job name, so it is
/// restricted to ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct JobId(String);

impl JobId {
    /// Accepts caller-supplied ids verbatim when they are executor safe.
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(JobId(raw))
        } else {
            Err(ModelError::InvalidJobId(raw))
        }
    }

    /// Derives an id from a library-relative path: every character outside
    /// `[A-Za-z0-9]` becomes `-`.
    pub fn from_path_key(relative_path: &str) -> Self {
        let sanitized: String = relative_path
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        if sanitized.is_empty() {
            JobId(Uuid::now_v7().simple().to_string())
        } else {
            JobId(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JobId::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_key_replaces_non_alphanumerics() {
        let id = JobId::from_path_key("Movies/The Matrix (1999).avi");
        assert_eq!(id.as_str(), "Movies-The-Matrix--1999--avi");
    }

    #[test]
    fn caller_ids_must_be_executor_safe() {
        assert!(JobId::new("handbrake-42").is_ok());
        assert!(JobId::new("").is_err());
        assert!(JobId::new("has space").is_err());
    }
}
