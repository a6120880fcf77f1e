use chrono::{DateTime, Utc};

use crate::ids::MediaEntityId;
use crate::media_type::MediaType;
use crate::metadata::MediaMetadata;

/// One catalogued filesystem path.
///
/// `relative_path` is unique across the catalog. `parent_id` always refers to
/// an entity whose path is a strict prefix of this one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaEntity {
    pub id: MediaEntityId,
    pub relative_path: String,
    pub absolute_path: String,
    pub file_name: String,
    pub media_type: MediaType,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub metadata: Option<MediaMetadata>,
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub parent_id: Option<MediaEntityId>,
    pub size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaEntity {
    /// Display title, falling back to the file name when no metadata exists.
    pub fn display_title(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.title.as_deref())
            .unwrap_or(&self.file_name)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
