//! Provider lookups with path-derived fallbacks.

use reelhouse_model::{MediaMetadata, MediaType};
use tracing::debug;

use crate::classifier::MediaPath;
use crate::error::ProviderError;
use crate::ports::MetadataProvider;

/// Metadata for one path, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedMetadata {
    /// Returned by the provider.
    Provided(MediaMetadata),
    /// Built from the path or the series record because the provider failed.
    Fallback(MediaMetadata),
}

impl ResolvedMetadata {
    pub fn metadata(&self) -> &MediaMetadata {
        match self {
            ResolvedMetadata::Provided(metadata) | ResolvedMetadata::Fallback(metadata) => metadata,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResolvedMetadata::Fallback(_))
    }

    /// Combines the lookup with what is already stored. Provider data is
    /// merged field by field; a fallback only fills an empty slot and never
    /// replaces stored metadata.
    pub fn apply_to(self, existing: Option<MediaMetadata>) -> MediaMetadata {
        match (self, existing) {
            (ResolvedMetadata::Provided(fresh), Some(current)) => current.merge(&fresh),
            (ResolvedMetadata::Provided(fresh), None) => fresh,
            (ResolvedMetadata::Fallback(_), Some(current)) => current,
            (ResolvedMetadata::Fallback(fallback), None) => fallback,
        }
    }
}

/// Fetches metadata for `path`, falling back when the provider fails.
///
/// Movies and series fall back to a title-only record. Seasons and episodes
/// fall back to the series metadata re-labelled with their own number;
/// `series` is that series metadata when the caller already has it.
pub async fn resolve_metadata(
    provider: &dyn MetadataProvider,
    path: &MediaPath,
    series: Option<&MediaMetadata>,
) -> ResolvedMetadata {
    let series_title = path
        .series_path()
        .map(|series| series.search_title().to_string())
        .unwrap_or_else(|| path.search_title().to_string());

    let series_fallback = || {
        series.cloned().unwrap_or_else(|| {
            let title = path.series_path().map_or(series_title.as_str(), MediaPath::title);
            MediaMetadata::title_only(title, MediaType::Series)
        })
    };

    match path.media_type() {
        MediaType::Movie => {
            let fetched = provider
                .fetch_movie(path.search_title(), path.release_year())
                .await;
            or_fallback(path, fetched, || {
                MediaMetadata::title_only(path.title(), MediaType::Movie)
            })
        }
        MediaType::Series => {
            let fetched = provider.fetch_series(path.search_title()).await;
            or_fallback(path, fetched, || {
                MediaMetadata::title_only(path.title(), MediaType::Series)
            })
        }
        MediaType::Season => {
            let number = path.season_number().unwrap_or_default();
            let fetched = provider.fetch_season(&series_title, number).await;
            or_fallback(path, fetched, || {
                series_fallback().derived(number, MediaType::Season)
            })
        }
        MediaType::Episode => {
            let season = path.season_number().unwrap_or_default();
            let number = path.episode_number().unwrap_or_default();
            let fetched = provider.fetch_episode(&series_title, season, number).await;
            or_fallback(path, fetched, || {
                series_fallback().derived(number, MediaType::Episode)
            })
        }
    }
}

fn or_fallback(
    path: &MediaPath,
    fetched: Result<MediaMetadata, ProviderError>,
    fallback: impl FnOnce() -> MediaMetadata,
) -> ResolvedMetadata {
    match fetched {
        Ok(metadata) => ResolvedMetadata::Provided(metadata),
        Err(err) => {
            debug!(path = path.relative_path(), "using fallback metadata: {}", err);
            ResolvedMetadata::Fallback(fallback())
        }
    }
}
