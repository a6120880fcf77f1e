use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashSet;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tracing::{debug, info, warn};

use super::{DirectoryObserver, WatchEventKind, WatcherConfig, wait_for_write_complete};
use crate::error::{MediaError, Result};

/// Watches library roots and fans stabilized changes out to observers.
pub struct DirectoryWatcher {
    config: WatcherConfig,
    observers: Arc<Vec<Arc<dyn DirectoryObserver>>>,
    running: tokio::sync::Mutex<Option<RunningWatch>>,
}

impl fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("DirectoryWatcher");
        debug
            .field("config", &self.config)
            .field("observer_count", &self.observers.len());

        match self.running.try_lock() {
            Ok(guard) => {
                let watched = guard.as_ref().map(|running| running.watched_count());
                debug.field("watched_directories", &watched);
            }
            Err(_) => {
                debug.field("running", &"<locked>");
            }
        }

        debug.finish()
    }
}

struct RunningWatch {
    registry: Arc<Mutex<Registry>>,
    event_loop: JoinHandle<()>,
}

impl RunningWatch {
    fn watched_count(&self) -> Option<usize> {
        self.registry.lock().ok().map(|registry| registry.watched.len())
    }
}

/// The `notify` handle plus the set of directories it currently covers.
struct Registry {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
}

enum WatchMessage {
    Event(Event),
    Error(String),
}

impl DirectoryWatcher {
    pub fn new(config: WatcherConfig, observers: Vec<Arc<dyn DirectoryObserver>>) -> Self {
        Self {
            config,
            observers: Arc::new(observers),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Registers every directory under `roots` and starts the event loop.
    ///
    /// Returns once all existing directories are watched; events are then
    /// delivered in the background until [`DirectoryWatcher::shutdown`]. A
    /// second call while running is a no-op.
    pub async fn start(&self, roots: Vec<PathBuf>) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<WatchMessage>(self.config.channel_capacity.max(16));

        let registry = spawn_blocking(move || -> Result<Registry> {
            let watcher = RecommendedWatcher::new(
                move |res: std::result::Result<Event, notify::Error>| {
                    let message = match res {
                        Ok(event) => WatchMessage::Event(event),
                        Err(err) => WatchMessage::Error(err.to_string()),
                    };
                    if let Err(err) = tx.blocking_send(message) {
                        warn!("watch channel send failed: {}", err);
                    }
                },
                NotifyConfig::default(),
            )
            .map_err(|e| MediaError::Watch(format!("failed to create watcher: {e}")))?;

            let mut registry = Registry {
                watcher,
                watched: HashSet::new(),
            };
            for root in &roots {
                if !root.is_dir() {
                    return Err(MediaError::Watch(format!(
                        "library root {} is not a directory",
                        root.display()
                    )));
                }
                registry.register_tree(root);
            }
            Ok(registry)
        })
        .await
        .map_err(|e| MediaError::Watch(format!("watcher initialization panicked: {e}")))??;

        info!(directories = registry.watched.len(), "directory watcher started");

        let registry = Arc::new(Mutex::new(registry));
        let event_loop = tokio::spawn(run_event_loop(
            rx,
            Arc::clone(&registry),
            Arc::clone(&self.observers),
            self.config.clone(),
        ));

        *running = Some(RunningWatch {
            registry,
            event_loop,
        });
        Ok(())
    }

    /// Stops the event loop and drops every `notify` watch. Stabilizations
    /// already in progress still deliver their result.
    pub async fn shutdown(&self) {
        if let Some(running) = self.running.lock().await.take() {
            running.event_loop.abort();
            info!("directory watcher stopped");
        }
    }

    /// Number of directories currently watched. Zero when stopped.
    pub async fn watched_directories(&self) -> usize {
        self.running
            .lock()
            .await
            .as_ref()
            .and_then(RunningWatch::watched_count)
            .unwrap_or(0)
    }
}

impl Registry {
    /// Walks `top` breadth first and watches every directory not yet
    /// covered. Returns the entries found below newly watched directories.
    fn register_tree(&mut self, top: &Path) -> Vec<(PathBuf, bool)> {
        let mut discovered = Vec::new();
        let mut worklist = VecDeque::from([top.to_path_buf()]);

        while let Some(dir) = worklist.pop_front() {
            if self.watched.contains(&dir) {
                continue;
            }
            if let Err(err) = self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
                warn!(path = %dir.display(), "failed to watch directory: {}", err);
                continue;
            }
            debug!(path = %dir.display(), "watching directory");
            self.watched.insert(dir.clone());

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %dir.display(), "failed to list directory: {}", err);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    worklist.push_back(path.clone());
                }
                discovered.push((path, is_dir));
            }
        }

        discovered
    }

    /// Forgets `path` and everything below it so a directory recreated under
    /// the same name is registered again.
    fn forget_tree(&mut self, path: &Path) {
        let gone: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|watched| watched.starts_with(path))
            .cloned()
            .collect();
        for dir in gone {
            // The backend usually dropped the watch already.
            let _ = self.watcher.unwatch(&dir);
            self.watched.remove(&dir);
        }
    }
}

struct EventContext {
    registry: Arc<Mutex<Registry>>,
    observers: Arc<Vec<Arc<dyn DirectoryObserver>>>,
    config: WatcherConfig,
    stabilizing: Arc<DashSet<PathBuf>>,
}

async fn run_event_loop(
    mut rx: mpsc::Receiver<WatchMessage>,
    registry: Arc<Mutex<Registry>>,
    observers: Arc<Vec<Arc<dyn DirectoryObserver>>>,
    config: WatcherConfig,
) {
    let ctx = Arc::new(EventContext {
        registry,
        observers,
        config,
        stabilizing: Arc::new(DashSet::new()),
    });

    while let Some(message) = rx.recv().await {
        match message {
            WatchMessage::Event(event) => {
                for (kind, path) in translate_event(event) {
                    if ctx.config.is_ignored(&path) {
                        debug!(path = %path.display(), "ignoring path with excluded suffix");
                        continue;
                    }
                    match kind {
                        WatchEventKind::Created => on_created(&ctx, path).await,
                        WatchEventKind::Deleted => on_deleted(&ctx, path),
                    }
                }
            }
            WatchMessage::Error(error) => warn!("watch backend error: {}", error),
        }
    }

    debug!("watch channel closed");
}

/// Maps a raw `notify` event onto create/delete pairs. Renames become a
/// delete of the old name and a create of the new one.
fn translate_event(event: Event) -> Vec<(WatchEventKind, PathBuf)> {
    let Event { kind, paths, .. } = event;
    match kind {
        EventKind::Create(_) => paths
            .into_iter()
            .map(|path| (WatchEventKind::Created, path))
            .collect(),
        EventKind::Remove(_) => paths
            .into_iter()
            .map(|path| (WatchEventKind::Deleted, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => paths
                .into_iter()
                .map(|path| (WatchEventKind::Deleted, path))
                .collect(),
            RenameMode::To => paths
                .into_iter()
                .map(|path| (WatchEventKind::Created, path))
                .collect(),
            RenameMode::Both => {
                let mut paths = paths.into_iter();
                let mut translated = Vec::with_capacity(2);
                if let Some(old) = paths.next() {
                    translated.push((WatchEventKind::Deleted, old));
                }
                if let Some(new) = paths.next() {
                    translated.push((WatchEventKind::Created, new));
                }
                translated
            }
            _ => paths
                .into_iter()
                .map(|path| {
                    let kind = if path.exists() {
                        WatchEventKind::Created
                    } else {
                        WatchEventKind::Deleted
                    };
                    (kind, path)
                })
                .collect(),
        },
        _ => Vec::new(),
    }
}

async fn on_created(ctx: &Arc<EventContext>, path: PathBuf) {
    let is_dir = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    if !is_dir {
        stabilize_then_dispatch(ctx, path);
        return;
    }

    dispatch(&ctx.observers, WatchEventKind::Created, path.clone());

    let registry = Arc::clone(&ctx.registry);
    let top = path.clone();
    let discovered = spawn_blocking(move || match registry.lock() {
        Ok(mut registry) => registry.register_tree(&top),
        Err(_) => {
            warn!(path = %top.display(), "watch registry poisoned; subtree not registered");
            Vec::new()
        }
    })
    .await
    .unwrap_or_else(|err| {
        warn!(path = %path.display(), "subtree registration panicked: {}", err);
        Vec::new()
    });

    // Entries that landed before the new watches were in place.
    for (entry, entry_is_dir) in discovered {
        if ctx.config.is_ignored(&entry) {
            continue;
        }
        if entry_is_dir {
            dispatch(&ctx.observers, WatchEventKind::Created, entry);
        } else {
            stabilize_then_dispatch(ctx, entry);
        }
    }
}

fn on_deleted(ctx: &Arc<EventContext>, path: PathBuf) {
    if let Ok(mut registry) = ctx.registry.lock() {
        registry.forget_tree(&path);
    }
    dispatch(&ctx.observers, WatchEventKind::Deleted, path);
}

fn stabilize_then_dispatch(ctx: &Arc<EventContext>, path: PathBuf) {
    if !ctx.stabilizing.insert(path.clone()) {
        debug!(path = %path.display(), "already waiting for write completion");
        return;
    }

    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        let interval = ctx.config.stability_poll_interval();
        let outcome = wait_for_write_complete(&path, interval).await;
        ctx.stabilizing.remove(&path);

        match outcome {
            Ok(true) => dispatch(&ctx.observers, WatchEventKind::Created, path),
            Ok(false) => debug!(path = %path.display(), "file vanished before settling"),
            Err(err) => warn!(path = %path.display(), "failed to poll file: {}", err),
        }
    });
}

fn dispatch(observers: &Arc<Vec<Arc<dyn DirectoryObserver>>>, kind: WatchEventKind, path: PathBuf) {
    debug!(%kind, path = %path.display(), "dispatching watch event");
    for observer in observers.iter() {
        let observer = Arc::clone(observer);
        let path = path.clone();
        tokio::spawn(async move {
            if let Err(err) = observer.on_directory_event(kind, &path).await {
                warn!(%kind, path = %path.display(), "observer failed: {}", err);
            }
        });
    }
}
