// Worker - supervises sandboxed job execution
//
// `run` is the outer loop over jobs; `run_job_host` is the per-job
// procedure that owns a sandboxed child process for as long as the job
// runs, refreshing the lock and polling for abort messages while it does.

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, KillContext, ShutdownSender, ShutdownToken};

use crate::application::job_registry::JobTypeRegistry;
use crate::application::retry::Backoff;
use crate::domain::{Instruction, Lock, LogContext, Progress, Status};
use crate::port::{Controller, ControllerError, ProcessContext, Sandbox};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerTunables {
    pub poll_interval: std::time::Duration,
    pub process_timeout: std::time::Duration,
    pub registry_push_interval: std::time::Duration,
    pub lock_refresh_interval: std::time::Duration,
    pub messages_interval: std::time::Duration,
}

impl Default for WorkerTunables {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            registry_push_interval: DEFAULT_REGISTRY_PUSH_INTERVAL,
            lock_refresh_interval: DEFAULT_LOCK_REFRESH_INTERVAL,
            messages_interval: DEFAULT_MESSAGES_INTERVAL,
        }
    }
}

/// Why a job was forced to an early end.
#[derive(Debug, Clone)]
struct AbortReason {
    origin: String,
    reason: String,
}

/// A worker: a controller handle, the set of job types it is willing to
/// run, a unique name, and its polling/refresh tunables.
pub struct Worker {
    name: String,
    controller: Arc<dyn Controller>,
    sandbox: Arc<dyn Sandbox>,
    job_types: JobTypeRegistry,
    tunables: WorkerTunables,
    backoff: Backoff,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        controller: Arc<dyn Controller>,
        sandbox: Arc<dyn Sandbox>,
        job_types: JobTypeRegistry,
        tunables: WorkerTunables,
    ) -> Self {
        Self {
            name: name.into(),
            controller,
            sandbox,
            job_types,
            tunables,
            backoff: Backoff::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retries `f` while it keeps failing with `ControllerError::Transient`,
    /// sleeping between attempts per the backoff policy; any other error, or
    /// exhaustion of `max_attempts`, is returned to the caller immediately.
    async fn retry_transient<T, F, Fut>(&self, seed: &str, mut f: F) -> Result<T, ControllerError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ControllerError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(ControllerError::Transient(msg)) => {
                    if attempt + 1 >= self.backoff.max_attempts() {
                        return Err(ControllerError::Transient(msg));
                    }
                    let delay = self.backoff.delay_ms(attempt, seed).max(0) as u64;
                    sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Supervisor loop: until a stop signal fires, pop a
    /// job and run it to completion, then release the lock.
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(worker = %self.name, "worker started");
        loop {
            if shutdown.is_stop() {
                break;
            }

            match self.controller.queue_pop(&self.name).await {
                Ok(Some(lock)) => {
                    self.run_job_host(&lock, &mut shutdown).await;
                    if let Err(e) = self.controller.release_lock(&lock.id).await {
                        warn!(worker = %self.name, lock_id = %lock.id, error = %e, "failed to release lock");
                    }
                }
                Ok(None) => {
                    if shutdown.is_stop_on_idle() {
                        info!(worker = %self.name, "queue empty and stop_on_idle set, exiting");
                        break;
                    }
                    tokio::select! {
                        _ = sleep(self.tunables.poll_interval) => {}
                        _ = shutdown.wait_stop() => break,
                    }
                }
                Err(e) => {
                    error!(worker = %self.name, error = %e, "queue_pop failed");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {}
                        _ = shutdown.wait_stop() => break,
                    }
                }
            }
        }
        info!(worker = %self.name, "worker stopped");
    }

    /// Run one job end to end: load its info, spawn a sandbox, supervise
    /// it until it finishes or is aborted, and finalize the registry
    /// entry regardless of how it ended.
    async fn run_job_host(&self, lock: &Lock, shutdown: &mut ShutdownToken) {
        let mut info = match self.controller.get_info(&lock.token).await {
            Ok(info) => info,
            Err(e) => {
                error!(worker = %self.name, token = %lock.token, error = %e, "failed to load job info, releasing");
                return;
            }
        };

        if !self.job_types.is_registered(&info.config.job_type) {
            error!(worker = %self.name, token = %lock.token, job_type = %info.config.job_type, "unregistered job type");
            info.report.log.log(
                LogContext::Error,
                &self.name,
                format!("unknown job type '{}'", info.config.job_type),
            );
            let _ = self
                .controller
                .registry_push(&lock.id, Some(Status::Failed), Some(info))
                .await;
            return;
        }

        if let Some(fresh) =
            self.job_types
                .fresh_report(&info.config.job_type, &self.name, &lock.token)
        {
            let extra = info.report.extra.clone();
            info.report = fresh;
            info.report.extra = extra;
        }

        let now = Utc::now();
        info.metadata.set_consumed(&self.name, now);
        info.report.progress = Progress::running("started", 0);
        info.report
            .log
            .log_at(LogContext::Event, now, &self.name, "consumed");

        let initial = ProcessContext::new(&self.name, info);
        let mut handle = match self.sandbox.spawn(initial.clone()).await {
            Ok(h) => h,
            Err(e) => {
                error!(worker = %self.name, token = %lock.token, error = %e, "failed to spawn sandbox");
                let mut info = initial.info;
                info.report.log.log(LogContext::Error, &self.name, e.to_string());
                let _ = self
                    .controller
                    .registry_push(&lock.id, Some(Status::Failed), Some(info))
                    .await;
                return;
            }
        };

        let mut current = initial;
        let start = Instant::now();
        let mut last_registry_push = Instant::now();
        let mut last_lock_refresh = Instant::now();
        let mut last_messages = Instant::now();
        let mut since = Utc::now();
        let mut abort: Option<AbortReason> = None;

        loop {
            if !handle.is_alive() {
                if let Ok(Some(snap)) = handle.poll_snapshot(SANDBOX_POLL_INTERVAL).await {
                    current = snap;
                }
                break;
            }

            match handle.poll_snapshot(SANDBOX_POLL_INTERVAL).await {
                Ok(Some(snap)) => current = snap,
                Ok(None) => {}
                Err(e) => {
                    warn!(worker = %self.name, token = %lock.token, error = %e, "error draining sandbox pipe");
                }
            }

            if last_registry_push.elapsed() >= self.tunables.registry_push_interval {
                last_registry_push = Instant::now();
                let pushed = self
                    .retry_transient(&lock.id, || {
                        self.controller.registry_push(
                            &lock.id,
                            Some(Status::Running),
                            Some(current.info.clone()),
                        )
                    })
                    .await;
                if let Err(e) = pushed {
                    warn!(worker = %self.name, token = %lock.token, error = %e, "registry push failed");
                    let reason = match e {
                        ControllerError::StaleLockRegistryPush => "stale lock",
                        _ => "cannot connect to controller",
                    };
                    abort = Some(AbortReason {
                        origin: self.name.clone(),
                        reason: reason.into(),
                    });
                }
            }

            if abort.is_none() && last_lock_refresh.elapsed() >= self.tunables.lock_refresh_interval
            {
                last_lock_refresh = Instant::now();
                match self
                    .retry_transient(&lock.id, || self.controller.refresh_lock(&lock.id))
                    .await
                {
                    Ok(_) => {}
                    Err(ControllerError::StaleLockRefresh) => {
                        abort = Some(AbortReason {
                            origin: self.name.clone(),
                            reason: "stale lock".into(),
                        });
                    }
                    Err(e) => {
                        warn!(worker = %self.name, token = %lock.token, error = %e, "lock refresh failed, will retry next interval");
                    }
                }
            }

            if abort.is_none() && last_messages.elapsed() >= self.tunables.messages_interval {
                let poll_at = Utc::now();
                last_messages = Instant::now();
                match self
                    .retry_transient(&lock.id, || self.controller.message_get(since))
                    .await
                {
                    Ok(messages) => {
                        for m in messages.iter().filter(|m| m.token == lock.token) {
                            if m.instruction == Instruction::Abort {
                                abort = Some(AbortReason {
                                    origin: m.origin.clone(),
                                    reason: m.content.clone(),
                                });
                            }
                        }
                        since = poll_at;
                    }
                    Err(e) => {
                        warn!(worker = %self.name, token = %lock.token, error = %e, "message poll failed, will retry next interval");
                    }
                }
            }

            if abort.is_none() && start.elapsed() >= self.tunables.process_timeout {
                abort = Some(AbortReason {
                    origin: self.name.clone(),
                    reason: format!(
                        "process timeout after {} seconds",
                        self.tunables.process_timeout.as_secs()
                    ),
                });
            }

            // a soft `stop` lets the in-flight job finish; `kill` forces
            // an immediate abort with the caller-supplied context.
            if abort.is_none() {
                if let Some(KillContext { origin, reason }) = shutdown.kill_context() {
                    abort = Some(AbortReason { origin, reason });
                }
            }

            if let Some(ctx) = &abort {
                warn!(worker = %self.name, token = %lock.token, reason = %ctx.reason, "aborting job");
                let _ = handle.kill().await;
                break;
            }
        }

        let stderr = handle.take_stderr();
        if !stderr.trim().is_empty() {
            current
                .info
                .report
                .log
                .log(LogContext::Error, &self.name, stderr.trim());
        }

        let mut info = current.info;
        let now = Utc::now();

        if let Some(ctx) = abort {
            for child in &current.children {
                if let Err(e) = self
                    .controller
                    .message_push(&child.id, Instruction::Abort, &ctx.origin, &ctx.reason)
                    .await
                {
                    info.report.log.log(
                        LogContext::Error,
                        &self.name,
                        format!("failed to abort child job '{}': {e}", child.name),
                    );
                }
            }
            info.metadata.set_aborted(&ctx.origin, now);
            info.report.progress = Progress::aborted(ctx.reason.clone());
            info.report
                .log
                .log_at(LogContext::Event, now, &self.name, "aborted");
            info.report.log.log_at(
                LogContext::Error,
                now,
                &ctx.origin,
                format!("aborted by '{}'", ctx.origin),
            );
            info.report
                .log
                .log_at(LogContext::Error, now, &ctx.origin, ctx.reason.clone());
            if let Err(e) = self
                .controller
                .registry_push(&lock.id, Some(Status::Aborted), Some(info))
                .await
            {
                error!(worker = %self.name, token = %lock.token, error = %e, "final abort registry push failed");
            }
        } else {
            info.metadata.set_completed(&self.name, now);
            if info.report.progress.status != Status::Completed {
                info.report.progress = Progress::completed("done");
            }
            info.report
                .log
                .log_at(LogContext::Event, now, &self.name, "completed");
            if let Err(e) = self
                .controller
                .registry_push(&lock.id, Some(Status::Completed), Some(info))
                .await
            {
                error!(worker = %self.name, token = %lock.token, error = %e, "final completion registry push failed");
            }
        }
    }
}
