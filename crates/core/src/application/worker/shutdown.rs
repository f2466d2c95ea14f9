// Worker stop-context
//
// Four independent signals, matching `StopContext` in the model this
// was generalized from: `stop` (soft, finish the in-flight job then
// exit), `stop_on_idle` (exit only once the queue is empty), `kill`
// (force-abort any in-flight job with a caller-supplied origin/reason,
// then stop), `stopped` (set by the worker itself once its supervisor
// loop has actually returned, so callers can block on full shutdown).

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillContext {
    pub origin: String,
    pub reason: String,
}

#[derive(Clone)]
pub struct ShutdownToken {
    stop: watch::Receiver<bool>,
    stop_on_idle: watch::Receiver<bool>,
    kill: watch::Receiver<Option<KillContext>>,
    stopped: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_stop(&self) -> bool {
        *self.stop.borrow()
    }

    pub fn is_stop_on_idle(&self) -> bool {
        *self.stop_on_idle.borrow()
    }

    /// The kill context, if `kill` has been signalled. Taken by
    /// `run_job_host` to force-abort the job it is currently supervising.
    pub fn kill_context(&self) -> Option<KillContext> {
        self.kill.borrow().clone()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolves as soon as `stop` or `kill` is signalled.
    pub async fn wait_stop(&mut self) {
        while !*self.stop.borrow() && self.kill.borrow().is_none() {
            tokio::select! {
                r = self.stop.changed() => if r.is_err() { break },
                r = self.kill.changed() => if r.is_err() { break },
            }
        }
    }
}

pub struct ShutdownSender {
    stop: watch::Sender<bool>,
    stop_on_idle: watch::Sender<bool>,
    kill: watch::Sender<Option<KillContext>>,
    stopped: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Soft stop: the supervisor loop exits after the current job (if
    /// any) finishes, without waiting for the queue to drain.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Exit only once `queue_pop` next returns empty.
    pub fn stop_on_idle(&self) {
        let _ = self.stop_on_idle.send(true);
    }

    /// Force-abort any in-flight job with the given origin/reason, then
    /// stop: sets both stop signals and forcibly terminates any
    /// in-flight child with the supplied abort context.
    pub fn kill(&self, origin: impl Into<String>, reason: impl Into<String>) {
        let _ = self.kill.send(Some(KillContext {
            origin: origin.into(),
            reason: reason.into(),
        }));
        let _ = self.stop.send(true);
        let _ = self.stop_on_idle.send(true);
    }

    /// Set by the worker's own supervisor loop on the way out.
    pub fn mark_stopped(&self) {
        let _ = self.stopped.send(true);
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            stop: self.stop.subscribe(),
            stop_on_idle: self.stop_on_idle.subscribe(),
            kill: self.kill.subscribe(),
            stopped: self.stopped.subscribe(),
        }
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (idle_tx, idle_rx) = watch::channel(false);
    let (kill_tx, kill_rx) = watch::channel(None);
    let (stopped_tx, stopped_rx) = watch::channel(false);
    let sender = ShutdownSender {
        stop: stop_tx,
        stop_on_idle: idle_tx,
        kill: kill_tx,
        stopped: stopped_tx,
    };
    let token = ShutdownToken {
        stop: stop_rx,
        stop_on_idle: idle_rx,
        kill: kill_rx,
        stopped: stopped_rx,
    };
    (sender, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_sets_both_stop_signals_and_kill_context() {
        let (sender, token) = shutdown_channel();
        sender.kill("tester", "because");
        assert!(token.is_stop());
        assert!(token.is_stop_on_idle());
        let ctx = token.kill_context().unwrap();
        assert_eq!(ctx.origin, "tester");
        assert_eq!(ctx.reason, "because");
    }
}
