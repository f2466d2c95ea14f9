// Controller port - registry, queue, locks, and messages for jobs
//
// Implementations: `infra-sqlite::SqliteController` (embedded) and
// `api-http::HttpController` (thin proxy to a remote controller).

use crate::domain::{JobInfo, Lock, Message, Status, Token};
use async_trait::async_trait;
use thiserror::Error;

/// Error taxonomy for controller operations: transient
/// transport errors are retried at the boundary by callers that choose
/// to (the HTTP proxy does this internally); semantic errors here are
/// never retried and are propagated as-is.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("stale lock, refresh rejected")]
    StaleLockRefresh,

    #[error("stale lock, update to job registry rejected")]
    StaleLockRegistryPush,

    #[error("resubmission conflict: token {token} already has a different originalBody")]
    ResubmissionConflict { token: String },

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("transient transport error: {0}")]
    Transient(String),

    #[error("internal controller error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

/// Outcome of `queue_push`: a brand-new registration, or the existing
/// token returned because of an idempotent resubmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuePushOutcome {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait Controller: Send + Sync {
    /// If `info.token` is absent, persist `info` with `status=queued`,
    /// enqueue it, stamp produced-metadata with this controller's name,
    /// and return `Created`. If present with an equal `originalBody`,
    /// return `AlreadyExists` without mutating anything. A
    /// differing `originalBody` is `ControllerError::ResubmissionConflict`.
    async fn queue_push(&self, info: JobInfo) -> Result<(Token, QueuePushOutcome)>;

    /// Atomically select one queued token with no live lock, mint a lock
    /// `{id, name=worker_name, expiresAt=now+lock_ttl}`, and return it.
    /// Returns `None` if the queue has no eligible token; two concurrent
    /// callers never receive a lock on the same token.
    async fn queue_pop(&self, worker_name: &str) -> Result<Option<Lock>>;

    /// Idempotent; removing an already-gone lock is not an error.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Extend a live lock's expiry to `now + lock_ttl`. Fails with
    /// `StaleLockRefresh` if the lock is missing or already expired.
    async fn refresh_lock(&self, lock_id: &str) -> Result<Lock>;

    async fn get_token(&self, token: &str) -> Result<Token>;
    async fn get_info(&self, token: &str) -> Result<JobInfo>;
    async fn get_status(&self, token: &str) -> Result<Status>;

    /// Validate that `lock_id` is live, then atomically update whichever
    /// of `status`/`info` is given. Fails with `StaleLockRegistryPush` if
    /// the lock is missing or expired.
    async fn registry_push(
        &self,
        lock_id: &str,
        status: Option<Status>,
        info: Option<JobInfo>,
    ) -> Result<()>;

    /// Append a message. If `token` no longer exists, the message is
    /// silently discarded.
    async fn message_push(
        &self,
        token: &str,
        instruction: crate::domain::Instruction,
        origin: &str,
        content: &str,
    ) -> Result<()>;

    /// Return messages with `receivedAt >= since`.
    async fn message_get(&self, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<Message>>;

    /// Purge expired locks/registry-records/messages; for each `running`
    /// record with no live lock, either requeue (reset metadata, EVENT
    /// log) or fail it (ERROR log, aborted-metadata), per `requeue`.
    /// Implementations call this at the start of every public operation
    /// above; it is also exposed directly so an ambient
    /// background scheduler can call it on an interval as a safety net.
    async fn cleanup(&self, requeue: bool) -> Result<()>;
}
