// Child-process execution sandbox port
//
// A `Sandbox` spawns one OS process per job and exchanges state snapshots
// with it; the worker owns the resulting `SandboxHandle` for the job's
// lifetime.

use crate::domain::JobInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("failed to spawn sandbox process: {0}")]
    SpawnFailed(String),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("io error exchanging snapshots with sandbox: {0}")]
    Io(String),

    #[error("failed to terminate sandbox process: {0}")]
    KillFailed(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;

/// A nested job registered by the running job body, reported back to the
/// parent in a snapshot. `abort` cannot cross a process boundary as a
/// callback, so it is resolved by the worker sending an abort `Message` to
/// `child.id` through the controller rather than invoking a callback
/// across the process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildJobRecord {
    pub id: String,
    pub name: String,
}

/// Exchange format between a worker and its sandboxed child, carried as
/// newline-delimited JSON over the child's stdio pipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessContext {
    pub worker_id: String,
    pub info: JobInfo,
    #[serde(default)]
    pub children: Vec<ChildJobRecord>,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub completed: bool,
}

impl ProcessContext {
    pub fn new(worker_id: impl Into<String>, info: JobInfo) -> Self {
        Self {
            worker_id: worker_id.into(),
            info,
            children: Vec::new(),
            started: false,
            completed: false,
        }
    }
}

/// A live child process plus its pipe.
#[async_trait]
pub trait SandboxHandle: Send {
    /// Wait up to `timeout` for a fresh snapshot from the child; returns
    /// `None` on timeout (the parent never blocks on this) or if the
    /// pipe has closed.
    async fn poll_snapshot(&mut self, timeout: Duration) -> Result<Option<ProcessContext>>;

    /// True while the OS process is still running.
    fn is_alive(&mut self) -> bool;

    /// Graceful-then-forcible termination (SIGTERM, poll, SIGKILL).
    async fn kill(&mut self) -> Result<()>;

    /// Exit code once the process has exited, if known.
    fn exit_code(&self) -> Option<i32>;

    /// Any stderr output captured from the child so far, for attribution
    /// into the job's own log on failure.
    fn take_stderr(&mut self) -> String;
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Spawn a fresh OS process that will run the job body registered
    /// under `initial.info.config.job_type`, send it `initial` as the
    /// first snapshot, and return a handle to it. Fails with
    /// `UnknownJobType` if no factory is registered under that name.
    async fn spawn(&self, initial: ProcessContext) -> Result<Box<dyn SandboxHandle>>;
}
