// Sandbox-side entry point: read the initial
// `ProcessContext` off stdin, install termination handlers, run the
// registered job body, and stream snapshots back over stdout. Called
// from a binary's `main` when it detects it was re-spawned as a
// sandbox child (see `foreman-daemon`'s `--sandbox-child` flag).

use crate::job_body::{JobBodyRegistry, JobHandle};
use foreman_core::domain::LogContext;
use foreman_core::port::ProcessContext;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Runs to completion, writing the final snapshot and returning. Callers
/// should `std::process::exit(0)` right after: the final snapshot is
/// sent and the pipe closed.
pub async fn run_child(registry: JobBodyRegistry) {
    let initial = match read_initial_context().await {
        Some(ctx) => ctx,
        None => {
            eprintln!("sandbox child: failed to read initial ProcessContext from stdin");
            return;
        }
    };

    let job_type = initial.info.config.job_type.clone();
    let handle = JobHandle::new(
        initial.worker_id.clone(),
        initial.info,
        Box::new(tokio::io::stdout()),
    );

    handle
        .with_info(|info| {
            info.metadata.set_consumed(&initial.worker_id, chrono::Utc::now());
            info.report.progress = foreman_core::domain::Progress::running("started", 0);
        })
        .await;
    handle
        .log(LogContext::Event, &initial.worker_id, "consumed")
        .await;
    let _ = handle.push().await;

    let body = registry.get(&job_type);

    let run_result = match body {
        Some(body) => {
            let sigterm = install_termination_handler();
            tokio::select! {
                result = body.run(clone_handle(&handle)) => result,
                _ = sigterm => {
                    handle.log(LogContext::Shutdown, &initial.worker_id, "terminated by signal").await;
                    Err(crate::job_body::JobBodyError("terminated by signal".into()))
                }
            }
        }
        None => Err(crate::job_body::JobBodyError(format!(
            "unknown job type '{job_type}'"
        ))),
    };

    match run_result {
        Ok(()) => {
            handle
                .with_info(|info| {
                    info.metadata.set_completed(&initial.worker_id, chrono::Utc::now());
                    if info.report.progress.status != foreman_core::domain::Status::Completed {
                        info.report.progress = foreman_core::domain::Progress::completed("done");
                    }
                })
                .await;
            handle
                .log(LogContext::Event, &initial.worker_id, "completed")
                .await;
        }
        Err(e) => {
            handle.log(LogContext::Error, &initial.worker_id, e.to_string()).await;
            handle
                .with_info(|info| {
                    info.report.progress = foreman_core::domain::Progress::completed(format!(
                        "job body failed: {e}"
                    ));
                })
                .await;
        }
    }

    handle.mark_completed().await;
    let _ = handle.push().await;
}

/// `JobHandle` intentionally has no public `Clone`; job bodies and the
/// select-arm above share the same underlying state through its
/// `Arc<Mutex<..>>`, so this constructs a second handle over the same
/// inner state rather than a deep copy.
fn clone_handle(handle: &JobHandle) -> JobHandle {
    handle.share()
}

async fn read_initial_context() -> Option<ProcessContext> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let line = lines.next_line().await.ok()??;
    serde_json::from_str(&line).ok()
}

/// Resolves once SIGTERM (unix) or SIGINT is received, so the running
/// job body can be raced against it and the child exits cleanly rather
/// than waiting out the parent's SIGKILL escalation.
async fn install_termination_handler() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_body::{JobBody, JobBodyError};
    use async_trait::async_trait;
    use foreman_core::domain::{JobConfig, JobInfo, Token};

    struct EchoJob;

    #[async_trait]
    impl JobBody for EchoJob {
        async fn run(&self, handle: JobHandle) -> Result<(), JobBodyError> {
            handle.log(LogContext::Info, "echo", "done").await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn handle_reaches_completed_progress_after_successful_body() {
        let token = Token::new("t-1");
        let config = JobConfig::new("echo", serde_json::json!({}));
        let info = JobInfo::new(token, config, "worker-a");
        let handle = JobHandle::new("worker-a".into(), info, Box::new(tokio::io::sink()));
        EchoJob.run(clone_handle(&handle)).await.unwrap();
        handle
            .with_info(|info| assert_eq!(info.report.log.get(LogContext::Info).len(), 1))
            .await;
    }
}
