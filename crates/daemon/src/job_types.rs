//! Built-in job types shipped with the daemon binary.
//!
//! A production deployment registers its own `JobBody` implementations
//! (one process-wide binary, re-exec'd as the sandbox child); `noop`
//! exists so the daemon is runnable and testable out of the box
//! without any external job bodies registered.

use async_trait::async_trait;
use foreman_core::application::job_registry::JobTypeRegistry;
use foreman_core::domain::LogContext;
use foreman_infra_process::{JobBody, JobBodyError, JobBodyRegistry, JobHandle};

/// Logs one line and completes immediately.
pub struct NoopJob;

#[async_trait]
impl JobBody for NoopJob {
    async fn run(&self, handle: JobHandle) -> Result<(), JobBodyError> {
        handle.log(LogContext::Info, "noop", "no-op job ran").await;
        Ok(())
    }
}

/// The worker-side registry: tells `Worker::run_job_host` which job
/// types this pool is willing to accept and how to stamp out a fresh
/// `Report` for each.
pub fn worker_job_types() -> JobTypeRegistry {
    let mut registry = JobTypeRegistry::new();
    registry.register_default("noop");
    registry
}

/// The child-side registry: the actual runnable job bodies, looked up
/// by `JobConfig.type` once a sandboxed child starts.
pub fn child_job_bodies() -> JobBodyRegistry {
    let mut registry = JobBodyRegistry::new();
    registry.register("noop", std::sync::Arc::new(NoopJob));
    registry
}
