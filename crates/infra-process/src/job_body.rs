// Child-side job bodies
//
// This registry is deliberately separate from `JobTypeRegistry` in
// `foreman_core::application::job_registry`: that one lives in the
// worker process and only knows how to stamp out a fresh `Report` for
// a job type. This one lives in the sandboxed child and knows how to
// actually *run* one. A job body is looked up by `JobConfig.job_type`
// once the child has read its initial `ProcessContext` off stdin
//.

use foreman_core::domain::{JobInfo, LogContext, Progress};
use foreman_core::port::ChildJobRecord;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct JobBodyError(pub String);

impl fmt::Display for JobBodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for JobBodyError {}

impl From<String> for JobBodyError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobBodyError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a running job body sees: the mutable `JobInfo`, a way to push a
/// fresh snapshot to the parent over stdout, and a way to register a
/// nested child job by id/name so the worker can abort it later.
pub struct JobHandle {
    inner: Arc<Mutex<JobHandleInner>>,
}

struct JobHandleInner {
    worker_id: String,
    info: JobInfo,
    children: Vec<ChildJobRecord>,
    completed: bool,
    stdout: Box<dyn AsyncWrite + Send + Unpin>,
}

impl JobHandle {
    pub(crate) fn new(
        worker_id: String,
        info: JobInfo,
        stdout: Box<dyn AsyncWrite + Send + Unpin>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(JobHandleInner {
                worker_id,
                info,
                children: Vec::new(),
                completed: false,
                stdout,
            })),
        }
    }

    /// A second `JobHandle` over the same shared state. Kept private to
    /// the crate: job bodies receive one handle by value, but `child`
    /// also needs to race the body's future against a signal future and
    /// inspect the final state afterward.
    pub(crate) fn share(&self) -> JobHandle {
        JobHandle {
            inner: self.inner.clone(),
        }
    }

    pub async fn with_info<R>(&self, f: impl FnOnce(&mut JobInfo) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard.info)
    }

    pub async fn log(&self, ctx: LogContext, origin: &str, body: impl Into<String>) {
        self.with_info(|info| info.report.log.log(ctx, origin, body))
            .await;
    }

    pub async fn set_progress(&self, progress: Progress) {
        self.with_info(|info| info.report.progress = progress).await;
    }

    pub async fn register_child(&self, id: impl Into<String>, name: impl Into<String>) {
        let mut guard = self.inner.lock().await;
        guard.children.push(ChildJobRecord {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Serialize the current `ProcessContext` and write it as one JSON
    /// line to the parent.
    pub async fn push(&self) -> std::io::Result<()> {
        let mut guard = self.inner.lock().await;
        let snapshot = foreman_core::port::ProcessContext {
            worker_id: guard.worker_id.clone(),
            info: guard.info.clone(),
            children: guard.children.clone(),
            started: true,
            completed: guard.completed,
        };
        let mut line = serde_json::to_string(&snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        line.push('\n');
        guard.stdout.write_all(line.as_bytes()).await?;
        guard.stdout.flush().await?;
        Ok(())
    }

    /// Marks the snapshot as final; the next `push` carries
    /// `completed: true`.
    pub(crate) async fn mark_completed(&self) {
        self.inner.lock().await.completed = true;
    }
}

#[async_trait::async_trait]
pub trait JobBody: Send + Sync {
    async fn run(&self, handle: JobHandle) -> Result<(), JobBodyError>;
}

#[derive(Clone, Default)]
pub struct JobBodyRegistry {
    bodies: HashMap<String, Arc<dyn JobBody>>,
}

impl JobBodyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: impl Into<String>, body: Arc<dyn JobBody>) {
        self.bodies.insert(job_type.into(), body);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobBody>> {
        self.bodies.get(job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<&str> {
        self.bodies.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.bodies.contains_key(job_type)
    }
}
