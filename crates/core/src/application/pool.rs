// WorkerPool - fan-out of N workers sharing one controller
//
// Mirrors the `register_job_type`-then-`init` shape the two-pass
// start/stop/kill fan-out was generalized from: job types are declared
// against the pool before `init`, which stamps out the shared template
// into N independent `Worker`s, each with its own shutdown channel.
// `start`/`stop`/`stop_on_idle`/`kill` all issue non-blocking requests to
// every worker first; a caller that wants to block until every worker
// has actually stopped follows up with `join` or `join_timeout`
//.

use crate::application::job_registry::{JobTypeRegistry, ReportFactory};
use crate::application::worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerTunables};
use crate::port::{Controller, Sandbox};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool already initialized")]
    AlreadyInitialized,
}

struct PoolWorker {
    name: String,
    sender: Arc<ShutdownSender>,
}

pub struct WorkerPool {
    size: usize,
    controller: Arc<dyn Controller>,
    sandbox: Arc<dyn Sandbox>,
    job_types: JobTypeRegistry,
    tunables: WorkerTunables,
    workers: Vec<PoolWorker>,
    handles: Vec<JoinHandle<()>>,
    initialized: bool,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        controller: Arc<dyn Controller>,
        sandbox: Arc<dyn Sandbox>,
        tunables: WorkerTunables,
    ) -> Self {
        Self {
            size,
            controller,
            sandbox,
            job_types: JobTypeRegistry::new(),
            tunables,
            workers: Vec::new(),
            handles: Vec::new(),
            initialized: false,
        }
    }

    /// Must be called before `init`; mutates the shared template every
    /// worker in the pool is stamped from.
    pub fn register_job_type(&mut self, job_type: impl Into<String>, factory: ReportFactory) {
        self.job_types.register(job_type, factory);
    }

    pub fn register_default_job_type(&mut self, job_type: impl Into<String>) {
        self.job_types.register_default(job_type);
    }

    /// One-shot: stamps out `size` shutdown channels from the current
    /// template. A second call fails with `AlreadyInitialized` rather
    /// than silently no-op'ing.
    pub fn init(&mut self) -> Result<(), PoolError> {
        if self.initialized {
            return Err(PoolError::AlreadyInitialized);
        }
        for i in 0..self.size {
            let (sender, _token) = shutdown_channel();
            self.workers.push(PoolWorker {
                name: format!("worker-{i}"),
                sender: Arc::new(sender),
            });
        }
        self.initialized = true;
        Ok(())
    }

    /// Spawn every worker's supervisor loop.
    pub fn start(&mut self) {
        for pool_worker in &self.workers {
            let token = pool_worker.sender.token();
            let sender = pool_worker.sender.clone();
            let worker_name = pool_worker.name.clone();
            let controller = self.controller.clone();
            let sandbox = self.sandbox.clone();
            let job_types = self.job_types.clone();
            let tunables = self.tunables.clone();
            let handle = tokio::spawn(async move {
                let worker = Worker::new(worker_name, controller, sandbox, job_types, tunables);
                worker.run(token).await;
                sender.mark_stopped();
            });
            self.handles.push(handle);
        }
    }

    /// Soft stop: every worker finishes its in-flight job, then exits.
    pub fn stop(&self) {
        for pool_worker in &self.workers {
            pool_worker.sender.stop();
        }
    }

    /// Exit once each worker's queue is observed empty.
    pub fn stop_on_idle(&self) {
        for pool_worker in &self.workers {
            pool_worker.sender.stop_on_idle();
        }
    }

    /// Force-abort whatever job every worker is currently running (if
    /// any) with the given origin/reason, then stop.
    pub fn kill(&self, origin: impl Into<String>, reason: impl Into<String>) {
        let origin = origin.into();
        let reason = reason.into();
        for pool_worker in &self.workers {
            pool_worker.sender.kill(origin.clone(), reason.clone());
        }
    }

    fn tokens(&self) -> Vec<ShutdownToken> {
        self.workers.iter().map(|w| w.sender.token()).collect()
    }

    /// Await full shutdown of every worker task. Second pass of the
    /// two-pass fan-out: `stop`/`stop_on_idle`/`kill` trigger, this
    /// blocks until every worker's supervisor loop has actually
    /// returned.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    /// Like `join`, but gives up (returning `false`) after `timeout` if
    /// any worker has not yet signalled `stopped`, without consuming the
    /// pool: the caller decides what to do (e.g. escalate to `kill`).
    pub async fn join_timeout(&self, timeout: Duration) -> bool {
        let tokens = self.tokens();
        let wait_all = async {
            for token in tokens {
                while !token.is_stopped() {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            }
        };
        tokio::time::timeout(timeout, wait_all).await.is_ok()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}
