//! Transcode job lifecycle.
//!
//! Jobs move `Queued -> Running -> {Succeeded | Failed}`. Every status change
//! is a compare-and-set on the [`JobStore`], and work on a single job is
//! serialized in-process by an in-flight set, so overlapping scans never
//! launch a job twice or reconcile a terminal transition twice.
//!
//! Three independent scans drive the state machine:
//! - the launch scan ([`TranscodeJobScheduler::scan_queued_jobs`]) starts
//!   queued jobs while slots are free;
//! - the status scan ([`TranscodeJobScheduler::update_job_status`]) picks up
//!   executor-reported terminal states and reconciles them;
//! - the ETA scan ([`TranscodeJobScheduler::extract_and_record_etas`]) copies
//!   remaining-time estimates onto running jobs.

pub mod config;

pub use config::{DEFAULT_PRESET, SchedulerConfig, TranscodePolicy};

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use reelhouse_model::{JobId, JobRequest, JobStatus, TranscodeJob};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::active::ActivePaths;
use crate::classifier::LibraryRoots;
use crate::error::{ExecutorError, MediaError, Result};
use crate::periodic::spawn_periodic;
use crate::ports::{ExecutorStatus, JobStore, MediaIngest, TranscodeExecutor};

pub struct TranscodeJobScheduler {
    config: SchedulerConfig,
    jobs: Arc<dyn JobStore>,
    executor: Arc<dyn TranscodeExecutor>,
    ingest: Arc<dyn MediaIngest>,
    active: ActivePaths,
    roots: LibraryRoots,
    in_flight: DashSet<JobId>,
}

impl fmt::Debug for TranscodeJobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodeJobScheduler")
            .field("config", &self.config)
            .field("roots", &self.roots)
            .field("active_paths", &self.active.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

/// Releases a job's in-flight slot when dropped.
struct InFlightGuard<'a> {
    set: &'a DashSet<JobId>,
    job_id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.job_id);
    }
}

impl TranscodeJobScheduler {
    pub fn new(
        config: SchedulerConfig,
        jobs: Arc<dyn JobStore>,
        executor: Arc<dyn TranscodeExecutor>,
        ingest: Arc<dyn MediaIngest>,
        active: ActivePaths,
        roots: LibraryRoots,
    ) -> Self {
        Self {
            config,
            jobs,
            executor,
            ingest,
            active,
            roots,
            in_flight: DashSet::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    fn claim(&self, job_id: &JobId) -> Option<InFlightGuard<'_>> {
        self.in_flight.insert(job_id.clone()).then(|| InFlightGuard {
            set: &self.in_flight,
            job_id: job_id.clone(),
        })
    }

    /// Stores a queued job and marks its input and output as active.
    ///
    /// Library-relative paths are resolved against the roots, so the job
    /// record, the active set and the executor all see the absolute paths
    /// the watcher reports. A relative output lands under the same root as
    /// its input. Without an explicit id, the id is derived from the input's
    /// library-relative path.
    ///
    /// Resubmitting an id that is still queued or running returns it
    /// unchanged. A terminal job with the same id is replaced.
    pub async fn submit_job(&self, request: JobRequest) -> Result<JobId> {
        if request.input_file.trim().is_empty() || request.output_file.trim().is_empty() {
            return Err(MediaError::InvalidRequest(
                "job needs both an input and an output file".to_string(),
            ));
        }

        let (input, output) = self.resolve_job_paths(&request.input_file, &request.output_file)?;
        if input == output {
            return Err(MediaError::InvalidRequest(format!(
                "input and output are the same file: {}",
                input.display()
            )));
        }

        let job_id = request.job_id.clone().unwrap_or_else(|| {
            match self.roots.relativize(&input) {
                Ok(relative) => JobId::from_path_key(&relative),
                Err(_) => JobId::from_path_key(&input.to_string_lossy()),
            }
        });

        let Some(_guard) = self.claim(&job_id) else {
            debug!(%job_id, "job is being worked on; keeping existing submission");
            return Ok(job_id);
        };

        if let Some(existing) = self.jobs.get(&job_id).await?
            && existing.status.is_active()
        {
            debug!(%job_id, status = %existing.status, "job already outstanding");
            return Ok(job_id);
        }

        let preset = request
            .preset
            .filter(|preset| !preset.trim().is_empty())
            .unwrap_or_else(|| self.config.default_preset.clone());
        let job = TranscodeJob::queued(
            job_id.clone(),
            input.to_string_lossy(),
            output.to_string_lossy(),
            preset,
        );

        self.jobs.upsert(&job).await?;
        self.mark_active(&job);

        info!(
            %job_id,
            input = %job.input_file,
            output = %job.output_file,
            preset = %job.preset,
            "transcode job queued"
        );
        Ok(job_id)
    }

    /// Launches the oldest queued jobs while fewer than `concurrency_limit`
    /// are running. Returns how many moved to `Running`.
    ///
    /// A failed launch leaves its job queued for the next scan.
    pub async fn scan_queued_jobs(&self) -> Result<usize> {
        let running = self.jobs.count_by_status(JobStatus::Running).await?;
        let slots = u64::from(self.config.concurrency_limit).saturating_sub(running);
        if slots == 0 {
            debug!(running, "no free transcode slots");
            return Ok(0);
        }

        let limit = u32::try_from(slots).unwrap_or(u32::MAX);
        let queued = self.jobs.list_by_status(JobStatus::Queued, Some(limit)).await?;

        let mut launched = 0;
        for job in queued {
            match self.launch_one(&job.job_id).await {
                Ok(true) => launched += 1,
                Ok(false) => {}
                Err(err) => warn!(job_id = %job.job_id, "launch attempt failed: {}", err),
            }
        }

        if launched > 0 {
            info!(launched, "transcode jobs started");
        }
        Ok(launched)
    }

    async fn launch_one(&self, job_id: &JobId) -> Result<bool> {
        let Some(_guard) = self.claim(job_id) else {
            debug!(%job_id, "launch skipped; job in flight");
            return Ok(false);
        };

        // Re-read under the guard; another scan may have moved it.
        let Some(job) = self.jobs.get(job_id).await? else {
            return Ok(false);
        };
        if job.status != JobStatus::Queued {
            return Ok(false);
        }

        remove_file_if_present(Path::new(&job.output_file)).await?;

        match self
            .executor
            .launch(job_id, &job.input_file, &job.output_file, &job.preset)
            .await
        {
            Ok(()) => {}
            Err(ExecutorError::AlreadyExists(_)) => {
                // A name clash means an earlier launch went through but its
                // status change was lost.
                match self.executor.status(job_id).await {
                    Ok(Some(status)) => {
                        info!(%job_id, %status, "adopting existing executor job");
                    }
                    Ok(None) => {
                        warn!(%job_id, "executor rejected launch but has no such job");
                        return Ok(false);
                    }
                    Err(err) => {
                        warn!(%job_id, "executor status check failed: {}", err);
                        return Ok(false);
                    }
                }
            }
            Err(err) => {
                warn!(%job_id, "executor launch failed; job stays queued: {}", err);
                return Ok(false);
            }
        }

        if self
            .jobs
            .transition(job_id, JobStatus::Queued, JobStatus::Running)
            .await?
        {
            info!(%job_id, input = %job.input_file, "transcode job running");
            Ok(true)
        } else {
            warn!(%job_id, "job left the queue while launching");
            Ok(false)
        }
    }

    /// Polls the executor for every running job and reconciles the ones that
    /// reached a terminal state. Returns how many were reconciled.
    pub async fn update_job_status(&self) -> Result<usize> {
        let running = self.jobs.list_by_status(JobStatus::Running, None).await?;

        let mut reconciled = 0;
        for job in running {
            match self.poll_one(job).await {
                Ok(true) => reconciled += 1,
                Ok(false) => {}
                Err(err) => warn!("status reconciliation failed: {}", err),
            }
        }
        Ok(reconciled)
    }

    async fn poll_one(&self, job: TranscodeJob) -> Result<bool> {
        let Some(_guard) = self.claim(&job.job_id) else {
            return Ok(false);
        };

        let status = match self.executor.status(&job.job_id).await {
            Ok(status) => status,
            Err(err) => {
                warn!(job_id = %job.job_id, "executor status unavailable: {}", err);
                return Ok(false);
            }
        };

        match status {
            Some(ExecutorStatus::Succeeded) => self.reconcile_success(&job).await,
            Some(ExecutorStatus::Failed) => self.reconcile_failure(&job).await,
            Some(ExecutorStatus::Running) => Ok(false),
            None if self.config.requeue_lost_jobs => {
                if self
                    .jobs
                    .transition(&job.job_id, JobStatus::Running, JobStatus::Queued)
                    .await?
                {
                    warn!(job_id = %job.job_id, "executor lost the job; requeued");
                }
                Ok(false)
            }
            None => {
                debug!(job_id = %job.job_id, "executor does not know the job");
                Ok(false)
            }
        }
    }

    async fn reconcile_success(&self, job: &TranscodeJob) -> Result<bool> {
        if !self
            .jobs
            .transition(&job.job_id, JobStatus::Running, JobStatus::Succeeded)
            .await?
        {
            return Ok(false);
        }

        self.release_executor_job(&job.job_id).await;

        if self.config.delete_input_on_success
            && let Err(err) = remove_file_if_present(Path::new(&job.input_file)).await
        {
            warn!(job_id = %job.job_id, input = %job.input_file, "failed to delete input: {}", err);
        }

        if let Err(err) = self.ingest.ingest_created(Path::new(&job.output_file)).await {
            error!(job_id = %job.job_id, output = %job.output_file, "failed to ingest output: {}", err);
        }

        self.clear_active(job);
        self.drop_terminal_record(&job.job_id).await;

        info!(job_id = %job.job_id, output = %job.output_file, "transcode job succeeded");
        Ok(true)
    }

    async fn reconcile_failure(&self, job: &TranscodeJob) -> Result<bool> {
        if !self
            .jobs
            .transition(&job.job_id, JobStatus::Running, JobStatus::Failed)
            .await?
        {
            return Ok(false);
        }

        self.release_executor_job(&job.job_id).await;

        if let Err(err) = remove_file_if_present(Path::new(&job.output_file)).await {
            warn!(job_id = %job.job_id, output = %job.output_file, "failed to delete partial output: {}", err);
        }

        self.clear_active(job);
        self.drop_terminal_record(&job.job_id).await;

        warn!(job_id = %job.job_id, input = %job.input_file, "transcode job failed");
        Ok(true)
    }

    async fn release_executor_job(&self, job_id: &JobId) {
        if let Err(err) = self.executor.delete(job_id).await {
            warn!(%job_id, "failed to release executor job: {}", err);
        }
    }

    async fn drop_terminal_record(&self, job_id: &JobId) {
        if self.config.retain_terminal_jobs {
            return;
        }
        if let Err(err) = self.jobs.remove(job_id).await {
            warn!(%job_id, "failed to delete terminal job: {}", err);
        }
    }

    /// Copies the executor's remaining-time estimate onto each running job.
    /// Status is never touched. Returns how many estimates changed.
    pub async fn extract_and_record_etas(&self) -> Result<usize> {
        let running = self.jobs.list_by_status(JobStatus::Running, None).await?;

        let mut updated = 0;
        for job in running {
            let eta = match self.executor.eta(&job.job_id).await {
                Ok(eta) => eta,
                Err(err) => {
                    debug!(job_id = %job.job_id, "no eta available: {}", err);
                    continue;
                }
            };
            if eta == job.eta {
                continue;
            }
            match self.jobs.record_eta(&job.job_id, eta).await {
                Ok(()) => updated += 1,
                Err(err) => warn!(job_id = %job.job_id, "failed to record eta: {}", err),
            }
        }
        Ok(updated)
    }

    /// Re-marks the files of every queued or running job as active. Called
    /// once at startup, before the watcher starts.
    pub async fn restore_active_paths(&self) -> Result<usize> {
        let active = self.jobs.list_active().await?;
        for job in &active {
            self.mark_active(job);
        }
        if !active.is_empty() {
            info!(jobs = active.len(), "restored active transcode paths");
        }
        Ok(active.len())
    }

    /// Spawns the launch, status and ETA tickers. They stop scheduling new
    /// scans once `shutdown` is cancelled.
    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let launch = Arc::clone(self);
        let status = Arc::clone(self);
        let eta = Arc::clone(self);

        vec![
            spawn_periodic(
                "transcode-launch-scan",
                self.config.launch_interval(),
                shutdown.clone(),
                move || {
                    let scheduler = Arc::clone(&launch);
                    async move {
                        if let Err(err) = scheduler.scan_queued_jobs().await {
                            error!("launch scan failed: {}", err);
                        }
                    }
                },
            ),
            spawn_periodic(
                "transcode-status-scan",
                self.config.status_interval(),
                shutdown.clone(),
                move || {
                    let scheduler = Arc::clone(&status);
                    async move {
                        if let Err(err) = scheduler.update_job_status().await {
                            error!("status scan failed: {}", err);
                        }
                    }
                },
            ),
            spawn_periodic(
                "transcode-eta-scan",
                self.config.eta_interval(),
                shutdown,
                move || {
                    let scheduler = Arc::clone(&eta);
                    async move {
                        if let Err(err) = scheduler.extract_and_record_etas().await {
                            error!("eta scan failed: {}", err);
                        }
                    }
                },
            ),
        ]
    }

    fn resolve_job_paths(&self, input: &str, output: &str) -> Result<(PathBuf, PathBuf)> {
        let (input, input_root) = self.resolve_path(Path::new(input.trim()), None)?;
        let (output, _) = self.resolve_path(Path::new(output.trim()), input_root.as_deref())?;
        Ok((input, output))
    }

    /// Absolute, lexically normalized form of a submitted path, plus the
    /// root a relative path was placed under.
    fn resolve_path(&self, path: &Path, preferred_root: Option<&Path>) -> Result<(PathBuf, Option<PathBuf>)> {
        if path.is_absolute() {
            return Ok((normalize_absolute(path), None));
        }

        let relative = self
            .roots
            .relativize(path)
            .map_err(|err| MediaError::InvalidRequest(format!("cannot place {}: {err}", path.display())))?;
        let root = match preferred_root {
            Some(root) => root.to_path_buf(),
            None => self.roots.root_for(&relative).cloned().ok_or_else(|| {
                MediaError::InvalidRequest(format!(
                    "relative path {relative} needs a configured library root"
                ))
            })?,
        };
        Ok((root.join(&relative), Some(root)))
    }

    fn mark_active(&self, job: &TranscodeJob) {
        self.active.insert(&job.input_file);
        self.active.insert(&job.output_file);
    }

    fn clear_active(&self, job: &TranscodeJob) {
        self.active.remove(Path::new(&job.input_file));
        self.active.remove(Path::new(&job.output_file));
    }
}

fn normalize_absolute(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

async fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed file");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
