//! End-to-end worker supervisor scenarios
//! driven against a real `SqliteController` but a hand-rolled in-process
//! `Sandbox`, so these run without spawning actual OS subprocesses.

use async_trait::async_trait;
use foreman_core::application::job_registry::JobTypeRegistry;
use foreman_core::application::pool::WorkerPool;
use foreman_core::application::worker::{shutdown_channel, Worker, WorkerTunables};
use foreman_core::domain::{Instruction, JobConfig, JobInfo, Progress, Status, Token};
use foreman_core::port::{Controller, ProcessContext, Sandbox, SandboxError, SandboxHandle};
use foreman_infra_sqlite::{create_pool, run_migrations, SqliteController};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A sandbox whose jobs finish on their very first poll, reporting
/// whatever final `Progress` the test asks for.
struct ImmediateSandbox {
    final_progress: Progress,
}

struct ImmediateHandle {
    context: Option<ProcessContext>,
    delivered: bool,
}

#[async_trait]
impl SandboxHandle for ImmediateHandle {
    async fn poll_snapshot(
        &mut self,
        _timeout: Duration,
    ) -> foreman_core::port::job_executor::Result<Option<ProcessContext>> {
        if self.delivered {
            return Ok(None);
        }
        self.delivered = true;
        Ok(self.context.take())
    }

    fn is_alive(&mut self) -> bool {
        !self.delivered
    }

    async fn kill(&mut self) -> foreman_core::port::job_executor::Result<()> {
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        Some(0)
    }

    fn take_stderr(&mut self) -> String {
        String::new()
    }
}

#[async_trait]
impl Sandbox for ImmediateSandbox {
    async fn spawn(
        &self,
        mut initial: ProcessContext,
    ) -> foreman_core::port::job_executor::Result<Box<dyn SandboxHandle>> {
        initial.info.report.progress = self.final_progress.clone();
        initial.completed = true;
        Ok(Box::new(ImmediateHandle {
            context: Some(initial),
            delivered: false,
        }))
    }
}

/// A sandbox whose jobs never finish on their own - `is_alive` always
/// returns true until the worker calls `kill`, simulating a long-running
/// job that only stops on an abort message or supervisor shutdown.
struct HangingSandbox;

struct HangingHandle {
    context: ProcessContext,
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl SandboxHandle for HangingHandle {
    async fn poll_snapshot(
        &mut self,
        timeout: Duration,
    ) -> foreman_core::port::job_executor::Result<Option<ProcessContext>> {
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    fn is_alive(&mut self) -> bool {
        !self.killed.load(Ordering::SeqCst)
    }

    async fn kill(&mut self) -> foreman_core::port::job_executor::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        if self.killed.load(Ordering::SeqCst) {
            Some(143)
        } else {
            None
        }
    }

    fn take_stderr(&mut self) -> String {
        String::new()
    }
}

#[async_trait]
impl Sandbox for HangingSandbox {
    async fn spawn(
        &self,
        initial: ProcessContext,
    ) -> foreman_core::port::job_executor::Result<Box<dyn SandboxHandle>> {
        Ok(Box::new(HangingHandle {
            context: initial,
            killed: Arc::new(AtomicBool::new(false)),
        }))
    }
}

/// A sandbox that always fails to spawn, to exercise the unknown-job-type
/// / spawn-failure path.
struct FailingSandbox;

#[async_trait]
impl Sandbox for FailingSandbox {
    async fn spawn(
        &self,
        _initial: ProcessContext,
    ) -> foreman_core::port::job_executor::Result<Box<dyn SandboxHandle>> {
        Err(SandboxError::SpawnFailed("simulated spawn failure".into()))
    }
}

async fn controller() -> Arc<dyn Controller> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteController::new(pool, "worker-scenarios", Duration::from_secs(30)))
}

fn job(job_type: &str) -> JobInfo {
    JobInfo::new(Token::generate(), JobConfig::new(job_type, json!({})), "test-host")
}

fn fast_tunables() -> WorkerTunables {
    WorkerTunables {
        poll_interval: Duration::from_millis(10),
        process_timeout: Duration::from_secs(60),
        registry_push_interval: Duration::from_millis(20),
        lock_refresh_interval: Duration::from_millis(20),
        messages_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn a_job_that_completes_reaches_completed_status() {
    let controller = controller().await;
    let (token, _) = controller.queue_push(job("noop")).await.unwrap();

    let mut job_types = JobTypeRegistry::new();
    job_types.register_default("noop");

    let sandbox = Arc::new(ImmediateSandbox {
        final_progress: Progress::completed("all done"),
    });
    let worker = Worker::new("w1", controller.clone(), sandbox, job_types, fast_tunables());

    let (sender, token_handle) = shutdown_channel();
    sender.stop_on_idle();
    worker.run(token_handle).await;

    assert_eq!(controller.get_status(&token.value).await.unwrap(), Status::Completed);
}

#[tokio::test]
async fn an_unregistered_job_type_is_failed_without_spawning() {
    let controller = controller().await;
    let (token, _) = controller.queue_push(job("mystery")).await.unwrap();

    let job_types = JobTypeRegistry::new(); // nothing registered
    let sandbox = Arc::new(FailingSandbox);
    let worker = Worker::new("w1", controller.clone(), sandbox, job_types, fast_tunables());

    let (sender, token_handle) = shutdown_channel();
    sender.stop_on_idle();
    worker.run(token_handle).await;

    assert_eq!(controller.get_status(&token.value).await.unwrap(), Status::Failed);
}

#[tokio::test]
async fn an_abort_message_stops_a_hanging_job() {
    let controller = controller().await;
    let (token, _) = controller.queue_push(job("noop")).await.unwrap();

    let mut job_types = JobTypeRegistry::new();
    job_types.register_default("noop");
    let sandbox = Arc::new(HangingSandbox);
    let worker = Worker::new("w1", controller.clone(), sandbox, job_types, fast_tunables());

    let (sender, token_handle) = shutdown_channel();
    let run_handle = tokio::spawn(async move {
        worker.run(token_handle).await;
    });

    // give the worker a moment to pop the job and start its host loop
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller
        .message_push(&token.value, Instruction::Abort, "test", "stop it")
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if controller.get_status(&token.value).await.unwrap() == Status::Aborted {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should have been aborted");

    sender.stop();
    let _ = tokio::time::timeout(Duration::from_secs(5), run_handle).await;
}

#[tokio::test]
async fn worker_pool_runs_a_submitted_job_to_completion() {
    let controller = controller().await;
    let sandbox = Arc::new(ImmediateSandbox {
        final_progress: Progress::completed("pool done"),
    });

    let mut pool = WorkerPool::new(2, controller.clone(), sandbox, fast_tunables());
    pool.register_default_job_type("noop");
    pool.init().unwrap();
    pool.start();

    let (token, _) = controller.queue_push(job("noop")).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if controller.get_status(&token.value).await.unwrap() == Status::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should have completed");

    pool.stop_on_idle();
    let stopped_in_time = pool.join_timeout(Duration::from_secs(5)).await;
    assert!(stopped_in_time);
}

#[tokio::test]
async fn pool_kill_force_stops_hanging_workers() {
    let controller = controller().await;
    let sandbox = Arc::new(HangingSandbox);

    let mut pool = WorkerPool::new(1, controller.clone(), sandbox, fast_tunables());
    pool.register_default_job_type("noop");
    pool.init().unwrap();
    pool.start();

    controller.queue_push(job("noop")).await.unwrap();

    // let the worker pick it up and get stuck in the hanging sandbox
    tokio::time::sleep(Duration::from_millis(100)).await;

    pool.kill("test", "forced shutdown");
    let stopped_in_time = pool.join_timeout(Duration::from_secs(5)).await;
    assert!(stopped_in_time);
}

#[tokio::test]
async fn second_init_of_a_pool_is_rejected() {
    let controller = controller().await;
    let sandbox = Arc::new(ImmediateSandbox {
        final_progress: Progress::completed("n/a"),
    });
    let mut pool = WorkerPool::new(1, controller, sandbox, fast_tunables());
    pool.init().unwrap();
    let err = pool.init().unwrap_err();
    assert!(matches!(err, foreman_core::application::pool::PoolError::AlreadyInitialized));
}
