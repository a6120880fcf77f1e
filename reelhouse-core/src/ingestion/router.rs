//! Watcher observer that decides what happens to each filesystem change.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use reelhouse_model::JobRequest;
use tracing::{debug, info};

use crate::active::ActivePaths;
use crate::classifier::{PathClassifier, conversion_output, patterns};
use crate::error::Result;
use crate::ports::MediaIngest;
use crate::scheduler::{TranscodeJobScheduler, TranscodePolicy};
use crate::watcher::{DirectoryObserver, WatchEventKind};

/// Extensions treated as video when no list is configured.
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpg", "mpeg",
];

/// Routes watcher events into ingestion or the transcode scheduler.
///
/// Events for paths the system is writing itself are dropped, as are files
/// without a video extension and folders inside `Movies`. At most one event per path is handled at a
/// time; duplicates arriving meanwhile are dropped.
pub struct LibraryEventRouter {
    ingest: Arc<dyn MediaIngest>,
    scheduler: Option<Arc<TranscodeJobScheduler>>,
    classifier: PathClassifier,
    active: ActivePaths,
    video_extensions: HashSet<String>,
    policy: TranscodePolicy,
    in_progress: DashSet<PathBuf>,
}

impl fmt::Debug for LibraryEventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryEventRouter")
            .field("transcoding", &self.scheduler.is_some())
            .field("policy", &self.policy)
            .field("active_paths", &self.active.len())
            .field("in_progress", &self.in_progress.len())
            .finish()
    }
}

impl LibraryEventRouter {
    pub fn new(
        ingest: Arc<dyn MediaIngest>,
        classifier: PathClassifier,
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
            ingest,
            scheduler: None,
            classifier,
            active,
            video_extensions: extensions,
            policy: TranscodePolicy::default(),
            in_progress: DashSet::new(),
        }
    }

    /// Sends matching file creates to `scheduler` instead of ingestion.
    pub fn with_transcoding(mut self, scheduler: Arc<TranscodeJobScheduler>, policy: TranscodePolicy) -> Self {
        self.scheduler = Some(scheduler);
        self.policy = policy;
        self
    }

    fn is_video(&self, path: &Path) -> bool {
        file_extension(path).is_some_and(|ext| self.video_extensions.contains(&ext))
    }

    async fn route(&self, kind: WatchEventKind, path: &Path) -> Result<()> {
        match kind {
            WatchEventKind::Created => {
                let is_dir = tokio::fs::metadata(path)
                    .await
                    .map(|meta| meta.is_dir())
                    .unwrap_or(false);
                if !is_dir && !self.is_video(path) {
                    debug!(path = %path.display(), "ignoring non-video file");
                    return Ok(());
                }
                if is_dir && self.classifier.is_in_movies(path) {
                    debug!(path = %path.display(), "ignoring movie folder");
                    return Ok(());
                }

                if !is_dir && let Some(scheduler) = self.transcoder_for(path) {
                    let request = JobRequest {
                        input_file: path.to_string_lossy().into_owned(),
                        output_file: conversion_output(path).to_string_lossy().into_owned(),
                        preset: None,
                        job_id: Some(self.classifier.job_id_for(path)),
                    };
                    let job_id = scheduler.submit_job(request).await?;
                    info!(path = %path.display(), %job_id, "queued for conversion");
                    return Ok(());
                }

                self.ingest.ingest_created(path).await
            }
            WatchEventKind::Deleted => {
                // A deleted path can no longer be stat'ed; anything carrying a
                // non-video extension is taken to be a plain file.
                if file_extension(path).is_some() && !self.is_video(path) {
                    debug!(path = %path.display(), "ignoring non-video delete");
                    return Ok(());
                }
                self.ingest.ingest_deleted(path).await.map(|_| ())
            }
        }
    }

    fn transcoder_for(&self, path: &Path) -> Option<&Arc<TranscodeJobScheduler>> {
        let scheduler = self.scheduler.as_ref()?;
        let ext = file_extension(path)?;
        self.policy.applies_to(&ext).then_some(scheduler)
    }
}

fn file_extension(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(patterns::extension)
}

#[async_trait]
impl DirectoryObserver for LibraryEventRouter {
    async fn on_directory_event(&self, kind: WatchEventKind, path: &Path) -> Result<()> {
        if self.active.contains(path) {
            debug!(%kind, path = %path.display(), "ignoring event for active transcode path");
            return Ok(());
        }

        if !self.in_progress.insert(path.to_path_buf()) {
            debug!(%kind, path = %path.display(), "path already being handled");
            return Ok(());
        }

        let outcome = self.route(kind, path).await;
        self.in_progress.remove(path);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::LibraryRoots;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingIngest {
        created: Mutex<Vec<PathBuf>>,
        deleted: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MediaIngest for RecordingIngest {
        async fn ingest_created(&self, path: &Path) -> Result<()> {
            self.created.lock().await.push(path.to_path_buf());
            Ok(())
        }

        async fn ingest_deleted(&self, path: &Path) -> Result<bool> {
            self.deleted.lock().await.push(path.to_path_buf());
            Ok(true)
        }
    }

    fn router(ingest: Arc<RecordingIngest>, active: ActivePaths) -> LibraryEventRouter {
        LibraryEventRouter::new(
            ingest,
            PathClassifier::new(LibraryRoots::new([PathBuf::from("/library")])),
            active,
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn forwards_video_files_and_skips_others() {
        let ingest = Arc::new(RecordingIngest::default());
        let router = router(Arc::clone(&ingest), ActivePaths::new());

        router
            .on_directory_event(WatchEventKind::Created, Path::new("/library/Movies/Heat.mkv"))
            .await
            .unwrap();
        router
            .on_directory_event(WatchEventKind::Created, Path::new("/library/Movies/Heat.nfo"))
            .await
            .unwrap();
        router
            .on_directory_event(WatchEventKind::Deleted, Path::new("/library/Movies/poster.jpg"))
            .await
            .unwrap();
        router
            .on_directory_event(WatchEventKind::Deleted, Path::new("/library/Series/Mr. Robot"))
            .await
            .unwrap();

        assert_eq!(
            *ingest.created.lock().await,
            vec![PathBuf::from("/library/Movies/Heat.mkv")]
        );
        assert_eq!(
            *ingest.deleted.lock().await,
            vec![PathBuf::from("/library/Series/Mr. Robot")]
        );
    }

    #[tokio::test]
    async fn active_paths_are_suppressed() {
        let ingest = Arc::new(RecordingIngest::default());
        let active = ActivePaths::new();
        active.insert("/library/Movies/Heat.mp4");
        let router = router(Arc::clone(&ingest), active);

        router
            .on_directory_event(WatchEventKind::Created, Path::new("/library/Movies/Heat.mp4"))
            .await
            .unwrap();

        assert!(ingest.created.lock().await.is_empty());
    }

    #[tokio::test]
    async fn movie_folder_yields_only_its_video() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Movies/Inception");
        std::fs::create_dir_all(&folder).unwrap();
        let movie = folder.join("Inception.mkv");
        std::fs::write(&movie, b"x").unwrap();
        let ingest = Arc::new(RecordingIngest::default());
        let router = LibraryEventRouter::new(
            Arc::clone(&ingest) as Arc<dyn MediaIngest>,
            PathClassifier::new(LibraryRoots::new([dir.path().to_path_buf()])),
            ActivePaths::new(),
            Vec::new(),
        );

        router
            .on_directory_event(WatchEventKind::Created, &folder)
            .await
            .unwrap();
        router
            .on_directory_event(WatchEventKind::Created, &movie)
            .await
            .unwrap();

        assert_eq!(*ingest.created.lock().await, vec![movie]);
    }

    #[tokio::test]
    async fn directories_pass_the_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        let season = dir.path().join("Season 1");
        std::fs::create_dir(&season).unwrap();
        let ingest = Arc::new(RecordingIngest::default());
        let router = router(Arc::clone(&ingest), ActivePaths::new());

        router
            .on_directory_event(WatchEventKind::Created, &season)
            .await
            .unwrap();

        assert_eq!(*ingest.created.lock().await, vec![season]);
    }
}
