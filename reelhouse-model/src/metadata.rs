use crate::media_type::MediaType;

/// Enrichment data attached to a catalogued entity.
///
/// Providers tend to return sentinel strings such as `"N/A"` or `"null"`, so
/// every textual field is optional and [`MediaMetadata::merge`] treats blank
/// and literal-`"null"` values as absent.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub release_year: Option<i32>,
    pub imdb_rating: Option<String>,
    pub meta_rating: Option<String>,
    pub genre: Option<String>,
    pub actors: Option<String>,
    pub plot: Option<String>,
    pub poster_url: Option<String>,
    /// Season or episode number when the metadata describes one.
    pub number: Option<u32>,
    pub media_type: Option<MediaType>,
}

impl MediaMetadata {
    /// Minimal record used when the provider has nothing for a movie or series.
    pub fn title_only(title: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            title: Some(title.into()),
            media_type: Some(media_type),
            ..Self::default()
        }
    }

    /// Copy of series-level metadata re-labelled for a season or episode.
    pub fn derived(&self, number: u32, media_type: MediaType) -> Self {
        Self {
            number: Some(number),
            media_type: Some(media_type),
            ..self.clone()
        }
    }

    /// Field-by-field merge. Values from `fresher` win only when they carry
    /// information; everything else keeps the existing value.
    pub fn merge(&self, fresher: &MediaMetadata) -> MediaMetadata {
        MediaMetadata {
            title: pick_text(&self.title, &fresher.title),
            release_year: fresher.release_year.or(self.release_year),
            imdb_rating: pick_text(&self.imdb_rating, &fresher.imdb_rating),
            meta_rating: pick_text(&self.meta_rating, &fresher.meta_rating),
            genre: pick_text(&self.genre, &fresher.genre),
            actors: pick_text(&self.actors, &fresher.actors),
            plot: pick_text(&self.plot, &fresher.plot),
            poster_url: pick_text(&self.poster_url, &fresher.poster_url),
            number: fresher.number.or(self.number),
            media_type: fresher.media_type.or(self.media_type),
        }
    }
}

fn pick_text(existing: &Option<String>, fresher: &Option<String>) -> Option<String> {
    match fresher {
        Some(value) if has_content(value) => Some(value.clone()),
        _ => existing.clone(),
    }
}

fn has_content(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_fresh_values_with_content() {
        let existing = MediaMetadata {
            title: Some("Heat".into()),
            plot: Some("A heist.".into()),
            imdb_rating: Some("8.3".into()),
            ..MediaMetadata::default()
        };
        let fresher = MediaMetadata {
            title: Some("Heat (1995)".into()),
            plot: Some("null".into()),
            imdb_rating: Some("   ".into()),
            genre: Some("Crime".into()),
            ..MediaMetadata::default()
        };

        let merged = existing.merge(&fresher);

        assert_eq!(merged.title.as_deref(), Some("Heat (1995)"));
        assert_eq!(merged.plot.as_deref(), Some("A heist."));
        assert_eq!(merged.imdb_rating.as_deref(), Some("8.3"));
        assert_eq!(merged.genre.as_deref(), Some("Crime"));
    }

    #[test]
    fn derived_keeps_series_fields() {
        let series = MediaMetadata {
            title: Some("Dark".into()),
            genre: Some("Mystery".into()),
            media_type: Some(MediaType::Series),
            ..MediaMetadata::default()
        };

        let episode = series.derived(4, MediaType::Episode);

        assert_eq!(episode.genre.as_deref(), Some("Mystery"));
        assert_eq!(episode.number, Some(4));
        assert_eq!(episode.media_type, Some(MediaType::Episode));
    }
}
