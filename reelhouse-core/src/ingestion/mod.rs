//! Turning filesystem changes into catalog records.
//!
//! [`IngestionPipeline`] is the single writer for media entities and their
//! change events. The other types in this module drive it: the
//! [`LibraryEventRouter`] from watcher events, the [`LibraryInitializer`] at
//! startup, and the [`MetadataRefresher`] on a timer.

pub mod initializer;
pub mod refresh;
pub mod resolve;
pub mod retention;
pub mod router;

pub use initializer::LibraryInitializer;
pub use refresh::{MaintenanceConfig, MetadataRefresher};
pub use resolve::{ResolvedMetadata, resolve_metadata};
pub use retention::EventRetention;
pub use router::LibraryEventRouter;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use reelhouse_model::{MediaEntity, MediaEntityId, MediaEvent, MediaMetadata, MediaType};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::classifier::{MediaPath, PathClassifier};
use crate::error::Result;
use crate::ports::{EventStore, MediaCache, MediaIngest, MediaStore, MetadataProvider, Notifier};

/// Capabilities the pipeline writes through.
#[derive(Clone)]
pub struct IngestionPorts {
    pub media: Arc<dyn MediaStore>,
    pub events: Arc<dyn EventStore>,
    pub cache: Arc<dyn MediaCache>,
    pub provider: Arc<dyn MetadataProvider>,
    pub notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for IngestionPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPorts").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    classifier: PathClassifier,
    ports: IngestionPorts,
    locks: PathLocks,
}

impl IngestionPipeline {
    pub fn new(classifier: PathClassifier, ports: IngestionPorts) -> Self {
        Self {
            classifier,
            ports,
            locks: PathLocks::default(),
        }
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    pub fn ports(&self) -> &IngestionPorts {
        &self.ports
    }

    /// Catalogs a newly created path.
    ///
    /// Paths that cannot be classified are logged and dropped (`Ok(None)`),
    /// as are folders inside `Movies`. Missing ancestors are created first,
    /// each with its own CREATE event. Every check-then-write on a relative
    /// path holds that path's lock, so concurrent creates under one new
    /// season share a single series and season row.
    ///
    /// Only persistence failures are returned; cache and notification
    /// failures are logged.
    pub async fn handle_create(&self, path: &Path) -> Result<Option<MediaEntity>> {
        let media_path = match self.classifier.classify(path) {
            Ok(media_path) => media_path,
            Err(err) => {
                warn!(path = %path.display(), "dropping unclassifiable path: {}", err);
                return Ok(None);
            }
        };

        let absolute = self.absolute_path_for(&media_path, Some(path));
        if media_path.media_type() == MediaType::Movie && is_directory(&absolute).await {
            debug!(path = media_path.relative_path(), "skipping movie folder");
            return Ok(None);
        }

        let mut parent: Option<MediaEntity> = None;
        let mut series_metadata: Option<MediaMetadata> = None;
        for ancestor in media_path.ancestors() {
            let _lock = self.locks.acquire(ancestor.relative_path()).await;
            let entity = match self.ports.media.get_by_path(ancestor.relative_path()).await? {
                Some(existing) => existing,
                None => {
                    let absolute = self.absolute_path_for(ancestor, None);
                    self.catalog(ancestor, &absolute, parent.as_ref(), series_metadata.as_ref(), None)
                        .await?
                }
            };
            if entity.media_type == MediaType::Series {
                series_metadata = entity.metadata.clone();
            }
            parent = Some(entity);
        }

        let _lock = self.locks.acquire(media_path.relative_path()).await;
        let existing = self.ports.media.get_by_path(media_path.relative_path()).await?;
        let entity = self
            .catalog(
                &media_path,
                &absolute,
                parent.as_ref(),
                series_metadata.as_ref(),
                existing,
            )
            .await?;

        Ok(Some(entity))
    }

    /// Removes the entity at exactly this path, if any, and always records
    /// one DELETE event. Paths outside every library root are dropped.
    pub async fn handle_delete(&self, path: &Path) -> Result<bool> {
        let relative = match self.classifier.relativize(path) {
            Ok(relative) => relative,
            Err(err) => {
                warn!(path = %path.display(), "dropping delete outside the library: {}", err);
                return Ok(false);
            }
        };

        let _lock = self.locks.acquire(&relative).await;
        let removed = self.ports.media.delete_by_path(&relative).await?;
        if removed {
            self.invalidate_cache(&relative).await;
        }

        self.ports.events.append(&MediaEvent::deleted(&relative)).await?;

        info!(path = %relative, removed, "media deleted");
        Ok(removed)
    }

    /// Builds (or refreshes) the entity for one classified path, persists it,
    /// then records its CREATE event.
    async fn catalog(
        &self,
        media_path: &MediaPath,
        absolute: &Path,
        parent: Option<&MediaEntity>,
        series_metadata: Option<&MediaMetadata>,
        existing: Option<MediaEntity>,
    ) -> Result<MediaEntity> {
        let resolved = resolve_metadata(self.ports.provider.as_ref(), media_path, series_metadata).await;
        let size_bytes = file_size(absolute).await;
        let now = Utc::now();

        let entity = match existing {
            Some(mut entity) => {
                entity.metadata = Some(resolved.apply_to(entity.metadata.take()));
                entity.absolute_path = absolute.to_string_lossy().into_owned();
                entity.parent_id = parent.map(|parent| parent.id);
                entity.size_bytes = size_bytes;
                entity.updated_at = now;
                entity
            }
            None => MediaEntity {
                id: MediaEntityId::new(),
                relative_path: media_path.relative_path().to_string(),
                absolute_path: absolute.to_string_lossy().into_owned(),
                file_name: media_path.file_name().to_string(),
                media_type: media_path.media_type(),
                season_number: media_path.season_number(),
                episode_number: media_path.episode_number(),
                metadata: Some(resolved.apply_to(None)),
                parent_id: parent.map(|parent| parent.id),
                size_bytes,
                created_at: now,
                updated_at: now,
            },
        };

        self.ports.media.save(&entity).await?;
        self.ports
            .events
            .append(&MediaEvent::created(&entity.relative_path, entity.id))
            .await?;

        self.invalidate_cache(&entity.relative_path).await;
        if let Err(err) = self.ports.cache.put(&entity).await {
            warn!(path = %entity.relative_path, "failed to cache media: {}", err);
        }

        if let Err(err) = self
            .ports
            .notifier
            .notify(entity.display_title(), &entity.relative_path)
            .await
        {
            warn!(path = %entity.relative_path, "notification failed: {}", err);
        }

        info!(
            path = %entity.relative_path,
            media_type = %entity.media_type,
            "media catalogued"
        );
        Ok(entity)
    }

    async fn invalidate_cache(&self, relative_path: &str) {
        if let Err(err) = self.ports.cache.invalidate(relative_path).await {
            warn!(path = relative_path, "failed to invalidate cache: {}", err);
        }
    }

    fn absolute_path_for(&self, media_path: &MediaPath, observed: Option<&Path>) -> PathBuf {
        match observed {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            _ => self
                .classifier
                .roots()
                .resolve(media_path.relative_path())
                .unwrap_or_else(|| PathBuf::from(media_path.relative_path())),
        }
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

/// Per-path mutexes. An entry lives only while someone holds or waits on it.
#[derive(Debug, Clone, Default)]
struct PathLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    async fn acquire(&self, relative_path: &str) -> PathLockGuard {
        let lock = Arc::clone(
            self.inner
                .entry(relative_path.to_string())
                .or_default()
                .value(),
        );
        let guard = lock.lock_owned().await;
        PathLockGuard {
            locks: Arc::clone(&self.inner),
            key: relative_path.to_string(),
            guard: Some(guard),
        }
    }
}

struct PathLockGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

async fn file_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        Ok(_) => None,
        Err(err) => {
            debug!(path = %path.display(), "size unavailable: {}", err);
            None
        }
    }
}

#[async_trait]
impl MediaIngest for IngestionPipeline {
    async fn ingest_created(&self, path: &Path) -> Result<()> {
        self.handle_create(path).await.map(|_| ())
    }

    async fn ingest_deleted(&self, path: &Path) -> Result<bool> {
        self.handle_delete(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        InMemoryCache, InMemoryEventStore, InMemoryMediaStore, NoopNotifier, UnavailableProvider,
    };
    use crate::classifier::LibraryRoots;
    use crate::error::ProviderError;
    use reelhouse_model::MediaEventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        pipeline: IngestionPipeline,
        media: InMemoryMediaStore,
        events: InMemoryEventStore,
        cache: InMemoryCache,
    }

    fn harness() -> Harness {
        harness_with(Path::new("/library"), Arc::new(UnavailableProvider))
    }

    fn harness_with(root: &Path, provider: Arc<dyn MetadataProvider>) -> Harness {
        let media = InMemoryMediaStore::new();
        let events = InMemoryEventStore::new();
        let cache = InMemoryCache::new();
        let pipeline = IngestionPipeline::new(
            PathClassifier::new(LibraryRoots::new([root.to_path_buf()])),
            IngestionPorts {
                media: Arc::new(media.clone()),
                events: Arc::new(events.clone()),
                cache: Arc::new(cache.clone()),
                provider,
                notifier: Arc::new(NoopNotifier),
            },
        );
        Harness {
            pipeline,
            media,
            events,
            cache,
        }
    }

    #[tokio::test]
    async fn episode_create_builds_parent_chain() {
        let h = harness();

        let episode = h
            .pipeline
            .handle_create(Path::new("/library/Series/Dark/Season 1/Episode 3.mkv"))
            .await
            .unwrap()
            .unwrap();

        let series = h.media.get_by_path("Series/Dark").await.unwrap().unwrap();
        let season = h
            .media
            .get_by_path("Series/Dark/Season 1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(season.parent_id, Some(series.id));
        assert_eq!(episode.parent_id, Some(season.id));
        assert_eq!(episode.episode_number, Some(3));
        assert_eq!(episode.season_number, Some(1));
        assert_eq!(
            episode.metadata.as_ref().and_then(|m| m.number),
            Some(3)
        );

        let events = h.events.snapshot().await;
        let paths: Vec<_> = events.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "Series/Dark",
                "Series/Dark/Season 1",
                "Series/Dark/Season 1/Episode 3.mkv"
            ]
        );
        assert!(h.cache.contains("Series/Dark/Season 1/Episode 3.mkv"));
    }

    #[tokio::test]
    async fn recreate_reuses_entity_and_keeps_existing_metadata() {
        let h = harness();
        let first = h
            .pipeline
            .handle_create(Path::new("Movies/Heat (1995).mkv"))
            .await
            .unwrap()
            .unwrap();

        let second = h
            .pipeline
            .handle_create(Path::new("Movies/Heat (1995).mkv"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(h.media.len().await, 1);
        assert_eq!(
            second.metadata.and_then(|m| m.title),
            Some("Heat (1995)".to_string())
        );
    }

    /// Answers the first movie lookup, then fails every call after it.
    #[derive(Default)]
    struct OutageProvider {
        movie_calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataProvider for OutageProvider {
        async fn fetch_movie(
            &self,
            title: &str,
            year: Option<i32>,
        ) -> std::result::Result<MediaMetadata, ProviderError> {
            if self.movie_calls.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(ProviderError::Transport("provider offline".into()));
            }
            Ok(MediaMetadata {
                title: Some(title.to_string()),
                release_year: year,
                plot: Some("A heist.".into()),
                media_type: Some(MediaType::Movie),
                ..MediaMetadata::default()
            })
        }

        async fn fetch_series(&self, title: &str) -> std::result::Result<MediaMetadata, ProviderError> {
            Err(ProviderError::NotFound(title.to_string()))
        }

        async fn fetch_season(
            &self,
            series: &str,
            _season: u32,
        ) -> std::result::Result<MediaMetadata, ProviderError> {
            Err(ProviderError::NotFound(series.to_string()))
        }

        async fn fetch_episode(
            &self,
            series: &str,
            _season: u32,
            _episode: u32,
        ) -> std::result::Result<MediaMetadata, ProviderError> {
            Err(ProviderError::NotFound(series.to_string()))
        }
    }

    #[tokio::test]
    async fn provider_outage_keeps_stored_metadata() {
        let h = harness_with(Path::new("/library"), Arc::new(OutageProvider::default()));

        let first = h
            .pipeline
            .handle_create(Path::new("Movies/Heat (1995).mkv"))
            .await
            .unwrap()
            .unwrap();
        let second = h
            .pipeline
            .handle_create(Path::new("Movies/Heat (1995).mkv"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.metadata.as_ref().and_then(|m| m.title.as_deref()), Some("Heat"));
        assert_eq!(second.metadata, first.metadata);
    }

    #[tokio::test]
    async fn movie_folders_are_not_catalogued() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Movies/Inception");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("Inception.mkv"), b"x").unwrap();
        let h = harness_with(dir.path(), Arc::new(UnavailableProvider));

        let skipped = h.pipeline.handle_create(&folder).await.unwrap();
        let movie = h
            .pipeline
            .handle_create(&folder.join("Inception.mkv"))
            .await
            .unwrap()
            .unwrap();

        assert!(skipped.is_none());
        assert_eq!(movie.relative_path, "Movies/Inception/Inception.mkv");
        assert_eq!(h.media.len().await, 1);
        assert_eq!(h.events.snapshot().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_episodes_share_one_series_and_season() {
        let h = harness();

        let tasks: Vec<_> = (1..=8)
            .map(|n| {
                let pipeline = h.pipeline.clone();
                tokio::spawn(async move {
                    let path = PathBuf::from(format!("/library/Series/Dark/Season 1/Episode {n}.mkv"));
                    pipeline.handle_create(&path).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap().unwrap();
        }

        let series = h.media.get_by_path("Series/Dark").await.unwrap().unwrap();
        let season = h
            .media
            .get_by_path("Series/Dark/Season 1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(season.parent_id, Some(series.id));
        for n in 1..=8 {
            let episode = h
                .media
                .get_by_path(&format!("Series/Dark/Season 1/Episode {n}.mkv"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(episode.parent_id, Some(season.id), "episode {n}");
        }
        assert_eq!(h.media.len().await, 10);

        let events = h.events.snapshot().await;
        for ancestor in ["Series/Dark", "Series/Dark/Season 1"] {
            let creates = events
                .iter()
                .filter(|e| e.relative_path == ancestor)
                .count();
            assert_eq!(creates, 1, "{ancestor}");
        }
    }

    #[tokio::test]
    async fn unclassifiable_create_is_dropped() {
        let h = harness();

        let outcome = h
            .pipeline
            .handle_create(Path::new("Series/Dark/Season 1/Ep 5.mkv"))
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert!(h.media.is_empty().await);
        assert!(h.events.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn delete_appends_one_event_whether_or_not_entity_existed() {
        let h = harness();
        h.pipeline
            .handle_create(Path::new("Movies/Heat.mkv"))
            .await
            .unwrap();

        let removed = h
            .pipeline
            .handle_delete(Path::new("/library/Movies/Heat.mkv"))
            .await
            .unwrap();
        let removed_again = h
            .pipeline
            .handle_delete(Path::new("/library/Movies/Heat.mkv"))
            .await
            .unwrap();

        assert!(removed);
        assert!(!removed_again);
        assert!(!h.cache.contains("Movies/Heat.mkv"));

        let deletes = h
            .events
            .snapshot()
            .await
            .into_iter()
            .filter(|e| e.kind == MediaEventKind::Delete)
            .count();
        assert_eq!(deletes, 2);
    }

    #[tokio::test]
    async fn delete_is_exact_path_only() {
        let h = harness();
        h.pipeline
            .handle_create(Path::new("Series/Dark/Season 1/Episode 1.mkv"))
            .await
            .unwrap();

        let removed = h.pipeline.handle_delete(Path::new("Series/Dark")).await.unwrap();

        assert!(removed);
        assert!(
            h.media
                .get_by_path("Series/Dark/Season 1/Episode 1.mkv")
                .await
                .unwrap()
                .is_some()
        );
    }
}
