use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use reelhouse_config::Config;
use reelhouse_core::adapters::postgres::{
    self, PostgresEventStore, PostgresJobStore, PostgresMediaStore,
};
use reelhouse_core::adapters::redis_cache::RedisMediaCache;
use reelhouse_core::adapters::{
    InMemoryCache, InMemoryEventStore, InMemoryJobStore, InMemoryMediaStore, LogNotifier,
    NoopNotifier, ProcessExecutor, UnavailableProvider,
};
use reelhouse_core::ports::{EventStore, JobStore, MediaCache, MediaIngest, MediaStore, Notifier};
use reelhouse_core::{
    ActivePaths, DirectoryObserver, DirectoryWatcher, EventRetention, IngestionPipeline,
    IngestionPorts, LibraryEventRouter, LibraryInitializer, LibraryRoots, MetadataRefresher,
    PathClassifier, TranscodeJobScheduler,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::app_state::AppState;

struct Stores {
    media: Arc<dyn MediaStore>,
    events: Arc<dyn EventStore>,
    jobs: Arc<dyn JobStore>,
    cache: Arc<dyn MediaCache>,
}

/// Everything `serve` runs, wired but not yet started.
pub struct Runtime {
    pub state: AppState,
    pub roots: Vec<PathBuf>,
    initializer: LibraryInitializer,
    refresher: Arc<MetadataRefresher>,
    retention: Arc<EventRetention>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

async fn connect_stores(config: &Config) -> Result<Stores> {
    let (media, events, jobs): (Arc<dyn MediaStore>, Arc<dyn EventStore>, Arc<dyn JobStore>) =
        match &config.database {
            Some(database) => {
                let pool = postgres::connect(&database.url, database.max_connections)
                    .await
                    .context("failed to connect to PostgreSQL")?;
                info!(max_connections = database.max_connections, "catalog stored in PostgreSQL");
                (
                    Arc::new(PostgresMediaStore::new(pool.clone())),
                    Arc::new(PostgresEventStore::new(pool.clone())),
                    Arc::new(PostgresJobStore::new(pool)),
                )
            }
            None => {
                warn!("no database configured; catalog kept in memory");
                (
                    Arc::new(InMemoryMediaStore::new()),
                    Arc::new(InMemoryEventStore::new()),
                    Arc::new(InMemoryJobStore::new()),
                )
            }
        };

    let cache: Arc<dyn MediaCache> = match &config.redis {
        Some(redis) => {
            let cache = RedisMediaCache::connect(&redis.url, redis.ttl)
                .await
                .context("failed to connect to Redis")?;
            info!("lookup cache backed by Redis");
            Arc::new(cache)
        }
        None => Arc::new(InMemoryCache::new()),
    };

    Ok(Stores {
        media,
        events,
        jobs,
        cache,
    })
}

/// Builds stores, pipeline, scheduler and watcher from configuration.
pub async fn wire_runtime(config: &Config) -> Result<Runtime> {
    let stores = connect_stores(config).await?;

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
        Arc::new(LogNotifier)
    } else {
        Arc::new(NoopNotifier)
    };

    let roots = config.library.roots.clone();
    let classifier = PathClassifier::new(LibraryRoots::new(roots.clone()));
    let active = ActivePaths::new();

    let pipeline = IngestionPipeline::new(
        classifier.clone(),
        IngestionPorts {
            media: stores.media,
            events: Arc::clone(&stores.events),
            cache: stores.cache,
            provider: Arc::new(UnavailableProvider),
            notifier,
        },
    );
    let ingest: Arc<dyn MediaIngest> = Arc::new(pipeline.clone());

    let scheduler = Arc::new(TranscodeJobScheduler::new(
        config.scheduler.clone(),
        stores.jobs,
        Arc::new(ProcessExecutor::new(config.transcode.command.clone())),
        Arc::clone(&ingest),
        active.clone(),
        classifier.roots().clone(),
    ));

    let router = LibraryEventRouter::new(
        ingest,
        classifier,
        active.clone(),
        config.library.video_extensions.clone(),
    )
    .with_transcoding(Arc::clone(&scheduler), config.transcode.policy.clone());
    let observers: Vec<Arc<dyn DirectoryObserver>> = vec![Arc::new(router)];
    let watcher = Arc::new(DirectoryWatcher::new(config.watcher.clone(), observers));

    let initializer = LibraryInitializer::new(
        pipeline.clone(),
        active,
        config.library.video_extensions.clone(),
    );
    let refresher = Arc::new(MetadataRefresher::new(
        pipeline.clone(),
        config.maintenance.clone(),
    ));
    let retention = Arc::new(EventRetention::new(
        stores.events,
        config.maintenance.clone(),
    ));

    Ok(Runtime {
        state: AppState {
            pipeline,
            scheduler,
            watcher,
        },
        roots,
        initializer,
        refresher,
        retention,
    })
}

impl Runtime {
    /// Restores in-flight jobs, catches up on files that arrived while the
    /// daemon was down, then starts the watcher and background tickers.
    pub async fn start(&self, shutdown: &CancellationToken) -> Result<Vec<JoinHandle<()>>> {
        let restored = self
            .state
            .scheduler
            .restore_active_paths()
            .await
            .context("failed to restore active transcode paths")?;
        if restored > 0 {
            info!(restored, "restored paths of outstanding transcode jobs");
        }

        let catalogued = self
            .initializer
            .run()
            .await
            .context("initial library walk failed")?;
        info!(catalogued, "initial library walk complete");

        self.state
            .watcher
            .start(self.roots.clone())
            .await
            .context("failed to start directory watcher")?;

        let mut tasks = self.state.scheduler.start(shutdown.clone());
        tasks.push(Arc::clone(&self.refresher).start(shutdown.clone()));
        tasks.push(Arc::clone(&self.retention).start(shutdown.clone()));
        Ok(tasks)
    }
}
