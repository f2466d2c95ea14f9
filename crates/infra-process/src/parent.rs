// Worker-side half of the sandbox: spawn one OS
// process per job, feed it the initial `ProcessContext` as a single JSON
// line on stdin, and drain `ProcessContext` snapshots from its stdout as
// newline-delimited JSON. Kill is graceful-then-forcible: SIGTERM, poll
// for exit every 100ms, SIGKILL after `GRACEFUL_SHUTDOWN_TIMEOUT_MS`
// (mirrors the subprocess executor this was generalized from).

use async_trait::async_trait;
use foreman_core::application::worker::constants::GRACEFUL_SHUTDOWN_TIMEOUT_MS;
use foreman_core::port::job_executor::Result;
use foreman_core::port::{ProcessContext, Sandbox, SandboxError, SandboxHandle};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, Mutex};

/// Spawns `program args...` as the sandbox process. In production this
/// is the host binary re-invoked with a flag that dispatches to
/// [`crate::run_child`] instead of the normal daemon/CLI entry point.
/// Tests that need supervisor-loop coverage without real subprocesses use
/// a hand-rolled in-process `Sandbox` instead (see
/// `foreman-integration-tests`'s `worker_scenarios.rs`).
pub struct SubprocessSandbox {
    program: PathBuf,
    args: Vec<String>,
}

impl SubprocessSandbox {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Convenience constructor for the common case: re-exec the current
    /// binary with `--sandbox-child`.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            vec!["--sandbox-child".to_string()],
        ))
    }
}

#[async_trait]
impl Sandbox for SubprocessSandbox {
    async fn spawn(&self, initial: ProcessContext) -> Result<Box<dyn SandboxHandle>> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| SandboxError::SpawnFailed(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::SpawnFailed("child has no stdin".into()))?;
        let mut line = serde_json::to_string(&initial)
            .map_err(|e| SandboxError::Io(e.to_string()))?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SandboxError::Io(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| SandboxError::Io(e.to_string()))?;
        drop(stdin);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::SpawnFailed("child has no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SandboxError::SpawnFailed("child has no stderr".into()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Ok(ctx) = serde_json::from_str::<ProcessContext>(&line) {
                            if tx.send(ctx).await.is_err() {
                                break;
                            }
                        }
                    }
                    _ => break,
                }
            }
        });

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_writer = stderr_buf.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut buf = stderr_writer.lock().await;
                buf.push_str(&line);
                buf.push('\n');
            }
        });

        Ok(Box::new(SubprocessHandle {
            child,
            snapshots: rx,
            stderr: stderr_buf,
            exit_code: None,
        }))
    }
}

struct SubprocessHandle {
    child: Child,
    snapshots: mpsc::Receiver<ProcessContext>,
    stderr: Arc<Mutex<String>>,
    exit_code: Option<i32>,
}

#[async_trait]
impl SandboxHandle for SubprocessHandle {
    async fn poll_snapshot(&mut self, timeout: Duration) -> Result<Option<ProcessContext>> {
        match tokio::time::timeout(timeout, self.snapshots.recv()).await {
            Ok(Some(ctx)) => Ok(Some(ctx)),
            Ok(None) => Ok(None),
            Err(_elapsed) => Ok(None),
        }
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_code = status.code();
                false
            }
            Err(_) => false,
        }
    }

    async fn kill(&mut self) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill as nix_kill, Signal};
            use nix::unistd::Pid;

            if let Some(id) = self.child.id() {
                let pid = Pid::from_raw(id as i32);
                let _ = nix_kill(pid, Signal::SIGTERM);

                let deadline = Duration::from_millis(GRACEFUL_SHUTDOWN_TIMEOUT_MS as u64);
                let waited = tokio::time::timeout(deadline, self.child.wait()).await;
                match waited {
                    Ok(Ok(status)) => {
                        self.exit_code = status.code();
                        return Ok(());
                    }
                    _ => {
                        let _ = nix_kill(pid, Signal::SIGKILL);
                    }
                }
            }
        }

        match self.child.kill().await {
            Ok(()) => {}
            Err(e) => return Err(SandboxError::KillFailed(e.to_string())),
        }
        if let Ok(status) = self.child.wait().await {
            self.exit_code = status.code();
        }
        Ok(())
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn take_stderr(&mut self) -> String {
        match self.stderr.try_lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => String::new(),
        }
    }
}
