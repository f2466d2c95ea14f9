// Worker tunables and their defaults (ADR: no magic values)
use std::time::Duration;

/// Sleep duration between `queue_pop` attempts when the queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Sleep duration after a controller connectivity error before retrying.
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// How often `run_job_host` pushes the latest snapshot to the registry.
pub const DEFAULT_REGISTRY_PUSH_INTERVAL: Duration = Duration::from_secs(2);

/// How often `run_job_host` refreshes its lock.
pub const DEFAULT_LOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// How often `run_job_host` polls for abort messages.
pub const DEFAULT_MESSAGES_INTERVAL: Duration = Duration::from_secs(1);

/// Wall-clock budget for a single job before it is forcibly aborted.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(3600);

/// Lock lease length; refreshed periodically while a job is running.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Non-blocking pipe-drain poll interval.
pub const SANDBOX_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default base delay for controller-connectivity backoff.
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Graceful process shutdown timeout before escalating to SIGKILL.
pub const GRACEFUL_SHUTDOWN_TIMEOUT_MS: i64 = 5000;
