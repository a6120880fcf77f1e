//! Startup catch-up for files that appeared while the service was down.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::IngestionPipeline;
use super::router::DEFAULT_VIDEO_EXTENSIONS;
use crate::active::ActivePaths;
use crate::classifier::patterns;
use crate::error::Result;
use crate::ports::MediaStore;

/// Walks every library root once and ingests directories and video files
/// that have no catalog entry yet. Folders inside `Movies` are walked but not
/// catalogued. A failure on one entry is logged and the walk moves on.
#[derive(Debug, Clone)]
pub struct LibraryInitializer {
    pipeline: IngestionPipeline,
    active: ActivePaths,
    video_extensions: HashSet<String>,
}

impl LibraryInitializer {
    pub fn new(
        pipeline: IngestionPipeline,
        active: ActivePaths,
        video_extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut extensions: HashSet<String> = video_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        if extensions.is_empty() {
            extensions = DEFAULT_VIDEO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect();
        }
        Self {
            pipeline,
            active,
            video_extensions: extensions,
        }
    }

    /// Returns how many paths were newly ingested.
    pub async fn run(&self) -> Result<usize> {
        let classifier = self.pipeline.classifier();
        let roots: Vec<PathBuf> = classifier.roots().iter().cloned().collect();
        let media = self.pipeline.ports().media.clone();

        let mut ingested = 0;
        let mut failed = 0;
        for root in roots {
            let mut worklist = VecDeque::from([root.clone()]);
            while let Some(dir) = worklist.pop_front() {
                let mut entries = match tokio::fs::read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(err) => {
                        warn!(path = %dir.display(), "failed to list directory: {}", err);
                        continue;
                    }
                };

                // Sorted so parents are catalogued before their children
                // and runs are reproducible.
                let mut children = Vec::new();
                loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => {
                            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                            children.push((entry.path(), is_dir));
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(path = %dir.display(), "failed to read directory entry: {}", err);
                            failed += 1;
                            break;
                        }
                    }
                }
                children.sort();

                for (path, is_dir) in children {
                    if is_dir {
                        worklist.push_back(path.clone());
                        if classifier.is_in_movies(&path) {
                            continue;
                        }
                    } else if !self.is_video(&path) || self.active.contains(&path) {
                        continue;
                    }

                    // Category folders themselves are not media.
                    let Ok(relative) = classifier.relativize(&path) else {
                        continue;
                    };
                    if !relative.contains('/') {
                        continue;
                    }
                    match media.get_by_path(&relative).await {
                        Ok(Some(_)) => continue,
                        Ok(None) => {}
                        Err(err) => {
                            warn!(path = %relative, "catalog lookup failed: {}", err);
                            failed += 1;
                            continue;
                        }
                    }

                    debug!(path = %relative, "catalog entry missing; ingesting");
                    match self.pipeline.handle_create(&path).await {
                        Ok(Some(_)) => ingested += 1,
                        Ok(None) => {}
                        Err(err) => {
                            warn!(path = %relative, "ingestion failed: {}", err);
                            failed += 1;
                        }
                    }
                }
            }
        }

        if failed > 0 {
            warn!(ingested, failed, "library initialization finished with failures");
        } else {
            info!(ingested, "library initialization complete");
        }
        Ok(ingested)
    }

    fn is_video(&self, path: &std::path::Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(patterns::extension)
            .is_some_and(|ext| self.video_extensions.contains(&ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        InMemoryCache, InMemoryEventStore, InMemoryMediaStore, NoopNotifier, UnavailableProvider,
    };
    use crate::classifier::{LibraryRoots, PathClassifier};
    use crate::error::MediaError;
    use crate::ingestion::IngestionPorts;
    use crate::ports::Page;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use reelhouse_model::{MediaEntity, MediaEntityId, MediaType};
    use std::sync::Arc;

    fn initializer_for(root: &std::path::Path, media: Arc<dyn MediaStore>) -> LibraryInitializer {
        let pipeline = IngestionPipeline::new(
            PathClassifier::new(LibraryRoots::new([root.to_path_buf()])),
            IngestionPorts {
                media,
                events: Arc::new(InMemoryEventStore::new()),
                cache: Arc::new(InMemoryCache::new()),
                provider: Arc::new(UnavailableProvider),
                notifier: Arc::new(NoopNotifier),
            },
        );
        LibraryInitializer::new(pipeline, ActivePaths::new(), Vec::new())
    }

    /// In-memory store whose lookups fail for one path.
    struct FailingLookupStore {
        inner: InMemoryMediaStore,
        broken: &'static str,
    }

    #[async_trait]
    impl MediaStore for FailingLookupStore {
        async fn get_by_path(&self, relative_path: &str) -> Result<Option<MediaEntity>> {
            if relative_path == self.broken {
                return Err(MediaError::Persistence(format!("lookup failed for {relative_path}")));
            }
            self.inner.get_by_path(relative_path).await
        }

        async fn get(&self, id: MediaEntityId) -> Result<Option<MediaEntity>> {
            self.inner.get(id).await
        }

        async fn save(&self, entity: &MediaEntity) -> Result<()> {
            self.inner.save(entity).await
        }

        async fn delete_by_path(&self, relative_path: &str) -> Result<bool> {
            self.inner.delete_by_path(relative_path).await
        }

        async fn find_stale(&self, older_than: DateTime<Utc>, limit: u32) -> Result<Vec<MediaEntity>> {
            self.inner.find_stale(older_than, limit).await
        }

        async fn list(&self, page: Page) -> Result<Vec<MediaEntity>> {
            self.inner.list(page).await
        }
    }

    #[tokio::test]
    async fn ingests_missing_entries_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("Series/Dark/Season 1")).unwrap();
        std::fs::create_dir_all(root.join("Movies")).unwrap();
        std::fs::write(root.join("Series/Dark/Season 1/Episode 1.mkv"), b"x").unwrap();
        std::fs::write(root.join("Movies/Heat.mkv"), b"x").unwrap();
        std::fs::write(root.join("Movies/Heat.nfo"), b"x").unwrap();

        let media = InMemoryMediaStore::new();
        let initializer = initializer_for(root, Arc::new(media.clone()));

        let first = initializer.run().await.unwrap();
        let second = initializer.run().await.unwrap();

        // Heat.mkv, Series/Dark, Season 1 and the episode.
        assert_eq!(media.len().await, 4);
        assert_eq!(first, 4);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn movie_folder_layout_yields_one_movie() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("Movies/Inception")).unwrap();
        std::fs::write(root.join("Movies/Inception/Inception.mkv"), b"x").unwrap();

        let media = InMemoryMediaStore::new();
        let initializer = initializer_for(root, Arc::new(media.clone()));

        assert_eq!(initializer.run().await.unwrap(), 1);

        let movies: Vec<_> = media
            .list(Page::new(10, 0))
            .await
            .unwrap()
            .into_iter()
            .filter(|entity| entity.media_type == MediaType::Movie)
            .map(|entity| entity.relative_path)
            .collect();
        assert_eq!(movies, vec!["Movies/Inception/Inception.mkv"]);
    }

    #[tokio::test]
    async fn one_failing_entry_does_not_stop_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("Movies")).unwrap();
        std::fs::write(root.join("Movies/Alien.mkv"), b"x").unwrap();
        std::fs::write(root.join("Movies/Broken.mkv"), b"x").unwrap();
        std::fs::write(root.join("Movies/Heat.mkv"), b"x").unwrap();

        let media = InMemoryMediaStore::new();
        let initializer = initializer_for(
            root,
            Arc::new(FailingLookupStore {
                inner: media.clone(),
                broken: "Movies/Broken.mkv",
            }),
        );

        assert_eq!(initializer.run().await.unwrap(), 2);
        assert!(media.get_by_path("Movies/Alien.mkv").await.unwrap().is_some());
        assert!(media.get_by_path("Movies/Heat.mkv").await.unwrap().is_some());
        assert!(media.get_by_path("Movies/Broken.mkv").await.unwrap().is_none());
    }
}
