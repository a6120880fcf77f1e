//! Local process executor.
//!
//! Runs the configured converter (HandBrakeCLI by default) as a child process
//! per job. The job id is the executor-side name; output from the child is
//! scanned for `ETA 01h25m15s` style progress lines.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use regex::Regex;
use reelhouse_model::JobId;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ExecutorError;
use crate::ports::{ExecutorStatus, TranscodeExecutor};

static ETA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2,})h(\d{2})m(?:(\d{2})s)?").expect("eta pattern")
});

/// Command line used to run one conversion. `{input}`, `{output}` and
/// `{preset}` are substituted per argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessExecutorConfig {
    /// Converter binary, resolved through `PATH` when relative.
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ProcessExecutorConfig {
    fn default() -> Self {
        Self {
            program: "HandBrakeCLI".to_string(),
            args: ["-Z", "{preset}", "-i", "{input}", "-o", "{output}", "-v"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
        }
    }
}

impl ProcessExecutorConfig {
    fn render_args(&self, input: &str, output: &str, preset: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", input)
                    .replace("{output}", output)
                    .replace("{preset}", preset)
            })
            .collect()
    }
}

/// Remaining time from a converter progress line, e.g. `ETA 01h25m15s`.
pub fn parse_eta(line: &str) -> Option<Duration> {
    let captures = ETA_PATTERN.captures(line)?;
    let hours: u64 = captures.get(1)?.as_str().parse().ok()?;
    let minutes: u64 = captures.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = captures
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}

#[derive(Clone)]
struct ProcessJob {
    status: Arc<RwLock<ExecutorStatus>>,
    eta: Arc<RwLock<Option<Duration>>>,
    cancel: CancellationToken,
}

impl fmt::Debug for ProcessJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .status
            .try_read()
            .map(|guard| guard.to_string())
            .unwrap_or_else(|_| "<locked>".to_string());
        f.debug_struct("ProcessJob")
            .field("status", &status)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    config: ProcessExecutorConfig,
    jobs: Arc<DashMap<JobId, ProcessJob>>,
}

impl ProcessExecutor {
    pub fn new(config: ProcessExecutorConfig) -> Self {
        Self {
            config,
            jobs: Arc::new(DashMap::new()),
        }
    }

    fn handle(&self, job_id: &JobId) -> Option<ProcessJob> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl TranscodeExecutor for ProcessExecutor {
    async fn launch(
        &self,
        job_id: &JobId,
        input_file: &str,
        output_file: &str,
        preset: &str,
    ) -> Result<(), ExecutorError> {
        let slot = match self.jobs.entry(job_id.clone()) {
            Entry::Occupied(_) => return Err(ExecutorError::AlreadyExists(job_id.clone())),
            Entry::Vacant(slot) => slot,
        };

        let args = self.config.render_args(input_file, output_file, preset);
        debug!(job_id = %job_id, program = %self.config.program, ?args, "spawning converter");

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ExecutorError::Launch {
                job_id: job_id.clone(),
                reason: err.to_string(),
            })?;

        let job = ProcessJob {
            status: Arc::new(RwLock::new(ExecutorStatus::Running)),
            eta: Arc::new(RwLock::new(None)),
            cancel: CancellationToken::new(),
        };

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(track_progress(stdout, Arc::clone(&job.eta)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(track_progress(stderr, Arc::clone(&job.eta)));
        }

        let status = Arc::clone(&job.status);
        let cancel = job.cancel.clone();
        let waiter_id = job_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                exit = child.wait() => {
                    let outcome = match exit {
                        Ok(exit) if exit.success() => ExecutorStatus::Succeeded,
                        Ok(exit) => {
                            warn!(job_id = %waiter_id, code = ?exit.code(), "converter exited with failure");
                            ExecutorStatus::Failed
                        }
                        Err(err) => {
                            warn!(job_id = %waiter_id, "failed to wait on converter: {err}");
                            ExecutorStatus::Failed
                        }
                    };
                    *status.write().await = outcome;
                }
                _ = cancel.cancelled() => {
                    if let Err(err) = child.kill().await {
                        warn!(job_id = %waiter_id, "failed to kill converter: {err}");
                    }
                }
            }
        });

        slot.insert(job);
        info!(job_id = %job_id, input = input_file, output = output_file, "converter launched");
        Ok(())
    }

    async fn status(&self, job_id: &JobId) -> Result<Option<ExecutorStatus>, ExecutorError> {
        match self.handle(job_id) {
            Some(job) => Ok(Some(*job.status.read().await)),
            None => Ok(None),
        }
    }

    async fn eta(&self, job_id: &JobId) -> Result<Option<Duration>, ExecutorError> {
        match self.handle(job_id) {
            Some(job) => Ok(*job.eta.read().await),
            None => Ok(None),
        }
    }

    async fn delete(&self, job_id: &JobId) -> Result<(), ExecutorError> {
        let (_, job) = self
            .jobs
            .remove(job_id)
            .ok_or_else(|| ExecutorError::NotFound(job_id.clone()))?;
        job.cancel.cancel();
        debug!(job_id = %job_id, "converter job released");
        Ok(())
    }
}

/// Converters redraw progress with `\r`, so both `\r` and `\n` end a line.
async fn track_progress<R>(mut reader: R, eta: Arc<RwLock<Option<Duration>>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending = String::new();

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        pending.push_str(&String::from_utf8_lossy(&buf[..read]));

        while let Some(idx) = pending.find(['\r', '\n']) {
            let line: String = pending.drain(..=idx).collect();
            if let Some(remaining) = parse_eta(&line) {
                *eta.write().await = Some(remaining);
            }
        }
    }

    if let Some(remaining) = parse_eta(&pending) {
        *eta.write().await = Some(remaining);
    }
}
