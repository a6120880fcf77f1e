use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use reelhouse_core::adapters::{
    InMemoryCache, InMemoryEventStore, InMemoryJobStore, InMemoryMediaStore, NoopNotifier,
    UnavailableProvider,
};
use reelhouse_core::ports::{ExecutorStatus, JobStore, MediaIngest, MediaStore, TranscodeExecutor};
use reelhouse_core::watcher::{DirectoryObserver, WatchEventKind};
use reelhouse_core::{
    ActivePaths, ExecutorError, IngestionPipeline, IngestionPorts, LibraryEventRouter,
    LibraryRoots, PathClassifier, SchedulerConfig, TranscodeJobScheduler, TranscodePolicy,
};
use reelhouse_model::{JobId, JobRequest, JobStatus, MediaEventKind, MediaType};

mock! {
    pub Executor {}

    #[async_trait]
    impl TranscodeExecutor for Executor {
        async fn launch(
            &self,
            job_id: &JobId,
            input_file: &str,
            output_file: &str,
            preset: &str,
        ) -> Result<(), ExecutorError>;
        async fn status(&self, job_id: &JobId) -> Result<Option<ExecutorStatus>, ExecutorError>;
        async fn eta(&self, job_id: &JobId) -> Result<Option<Duration>, ExecutorError>;
        async fn delete(&self, job_id: &JobId) -> Result<(), ExecutorError>;
    }
}

struct Catalog {
    pipeline: Arc<IngestionPipeline>,
    media: InMemoryMediaStore,
    events: InMemoryEventStore,
}

fn catalog(root: &Path) -> Catalog {
    let media = InMemoryMediaStore::new();
    let events = InMemoryEventStore::new();
    let pipeline = IngestionPipeline::new(
        PathClassifier::new(LibraryRoots::new([root.to_path_buf()])),
        IngestionPorts {
            media: Arc::new(media.clone()),
            events: Arc::new(events.clone()),
            cache: Arc::new(InMemoryCache::new()),
            provider: Arc::new(UnavailableProvider),
            notifier: Arc::new(NoopNotifier),
        },
    );
    Catalog {
        pipeline: Arc::new(pipeline),
        media,
        events,
    }
}

#[tokio::test]
async fn submitted_job_runs_to_success_and_output_is_catalogued() {
    let library = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(library.path().join("Movies")).unwrap();
    let input = library.path().join("Movies/X.avi");
    let output = library.path().join("Movies/X.mkv");
    std::fs::write(&input, b"source").unwrap();

    let written = output.clone();
    let mut executor = MockExecutor::new();
    executor
        .expect_launch()
        .withf(|job_id, _, output, preset| {
            job_id.as_str() == "Movies-X-avi"
                && output.ends_with("Movies/X.mkv")
                && preset == "Chromecast 1080p60 Surround"
        })
        .times(1)
        .returning(move |_, _, _, _| {
            std::fs::write(&written, b"converted").unwrap();
            Ok(())
        });
    executor
        .expect_status()
        .times(1)
        .returning(|_| Ok(Some(ExecutorStatus::Succeeded)));
    executor.expect_delete().times(1).returning(|_| Ok(()));

    let catalog = catalog(library.path());
    let jobs = InMemoryJobStore::new();
    let active = ActivePaths::new();
    let scheduler = TranscodeJobScheduler::new(
        SchedulerConfig::default(),
        Arc::new(jobs.clone()),
        Arc::new(executor),
        Arc::clone(&catalog.pipeline) as Arc<dyn MediaIngest>,
        active.clone(),
        catalog.pipeline.classifier().roots().clone(),
    );

    let job_id = scheduler
        .submit_job(JobRequest {
            input_file: input.to_string_lossy().into_owned(),
            output_file: output.to_string_lossy().into_owned(),
            preset: None,
            job_id: Some(JobId::from_path_key("Movies/X.avi")),
        })
        .await
        .unwrap();

    assert_eq!(scheduler.scan_queued_jobs().await.unwrap(), 1);
    assert_eq!(
        jobs.get(&job_id).await.unwrap().unwrap().status,
        JobStatus::Running
    );

    assert_eq!(scheduler.update_job_status().await.unwrap(), 1);

    let job = jobs.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert!(!input.exists());
    assert!(active.is_empty());

    let entity = catalog
        .media
        .get_by_path("Movies/X.mkv")
        .await
        .unwrap()
        .expect("output catalogued");
    assert_eq!(entity.media_type, MediaType::Movie);
    assert_eq!(entity.size_bytes, Some(9));

    let events = catalog.events.snapshot().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, MediaEventKind::Create);
    assert_eq!(events[0].relative_path, "Movies/X.mkv");
}

#[tokio::test]
async fn router_sends_convertible_files_to_the_scheduler() {
    let library = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(library.path().join("Movies")).unwrap();
    let avi = library.path().join("Movies/Heat.avi");
    let mkv = library.path().join("Movies/Heat.mkv");
    std::fs::write(&avi, b"source").unwrap();
    std::fs::write(&mkv, b"ready").unwrap();

    let catalog = catalog(library.path());
    let jobs = InMemoryJobStore::new();
    let active = ActivePaths::new();
    let scheduler = Arc::new(TranscodeJobScheduler::new(
        SchedulerConfig::default(),
        Arc::new(jobs.clone()),
        Arc::new(MockExecutor::new()),
        Arc::clone(&catalog.pipeline) as Arc<dyn MediaIngest>,
        active.clone(),
        catalog.pipeline.classifier().roots().clone(),
    ));
    let router = LibraryEventRouter::new(
        Arc::clone(&catalog.pipeline) as Arc<dyn MediaIngest>,
        catalog.pipeline.classifier().clone(),
        active.clone(),
        Vec::new(),
    )
    .with_transcoding(
        Arc::clone(&scheduler),
        TranscodePolicy {
            enabled: true,
            ..TranscodePolicy::default()
        },
    );

    router
        .on_directory_event(WatchEventKind::Created, &avi)
        .await
        .unwrap();
    router
        .on_directory_event(WatchEventKind::Created, &mkv)
        .await
        .unwrap();

    let queued = jobs.list_by_status(JobStatus::Queued, None).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].job_id.as_str(), "Movies-Heat-avi");
    assert_eq!(
        PathBuf::from(&queued[0].output_file),
        library.path().join("Movies/Heat.mp4")
    );
    assert!(active.contains(&avi));

    assert!(catalog.media.get_by_path("Movies/Heat.avi").await.unwrap().is_none());
    assert!(catalog.media.get_by_path("Movies/Heat.mkv").await.unwrap().is_some());

    // The converter's output shows up while the job is live and is ignored.
    router
        .on_directory_event(WatchEventKind::Created, &library.path().join("Movies/Heat.mp4"))
        .await
        .unwrap();
    assert_eq!(catalog.media.len().await, 1);
}

#[tokio::test]
async fn library_relative_job_suppresses_watcher_events_for_its_files() {
    let library = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(library.path().join("Movies")).unwrap();
    let input = library.path().join("Movies/X.avi");
    let output = library.path().join("Movies/X.mkv");
    std::fs::write(&input, b"source").unwrap();

    let launched_output = output.clone();
    let mut executor = MockExecutor::new();
    executor
        .expect_launch()
        .withf(move |_, input_file, output_file, _| {
            Path::new(input_file).is_absolute()
                && Path::new(output_file) == launched_output.as_path()
        })
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let catalog = catalog(library.path());
    let jobs = InMemoryJobStore::new();
    let active = ActivePaths::new();
    let scheduler = Arc::new(TranscodeJobScheduler::new(
        SchedulerConfig::default(),
        Arc::new(jobs.clone()),
        Arc::new(executor),
        Arc::clone(&catalog.pipeline) as Arc<dyn MediaIngest>,
        active.clone(),
        catalog.pipeline.classifier().roots().clone(),
    ));
    let router = LibraryEventRouter::new(
        Arc::clone(&catalog.pipeline) as Arc<dyn MediaIngest>,
        catalog.pipeline.classifier().clone(),
        active.clone(),
        Vec::new(),
    );

    let job_id = scheduler
        .submit_job(JobRequest {
            input_file: "Movies/X.avi".into(),
            output_file: "Movies/X.mkv".into(),
            preset: None,
            job_id: None,
        })
        .await
        .unwrap();
    assert_eq!(job_id.as_str(), "Movies-X-avi");
    assert_eq!(scheduler.scan_queued_jobs().await.unwrap(), 1);

    // The converter starts writing the output; the watcher reports it.
    std::fs::write(&output, b"partial").unwrap();
    router
        .on_directory_event(WatchEventKind::Created, &output)
        .await
        .unwrap();
    router
        .on_directory_event(WatchEventKind::Created, &input)
        .await
        .unwrap();

    assert!(catalog.media.is_empty().await);
    assert!(catalog.events.snapshot().await.is_empty());
}
