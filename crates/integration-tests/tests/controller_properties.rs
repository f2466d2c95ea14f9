//! Exercises the `Controller` port's testable properties
//! against the SQLite adapter: mutual exclusion of locks, rejection
//! of registry writes through a stale lock, idempotent resubmission,
//! and the safety-net cleanup pass.

use chrono::Utc;
use foreman_core::domain::{Instruction, JobConfig, JobInfo, Status};
use foreman_core::port::{Controller, ControllerError, QueuePushOutcome};
use foreman_infra_sqlite::{create_pool, run_migrations, SqliteController};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn controller(lock_ttl: Duration) -> Arc<dyn Controller> {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteController::new(pool, "test-controller", lock_ttl))
}

fn job(job_type: &str, body: serde_json::Value) -> JobInfo {
    let token = foreman_core::domain::Token::generate();
    JobInfo::new(token, JobConfig::new(job_type, body), "test-host")
}

#[tokio::test]
async fn queue_push_creates_a_queued_record() {
    let controller = controller(Duration::from_secs(30)).await;
    let info = job("noop", json!({"n": 1}));
    let (token, outcome) = controller.queue_push(info).await.unwrap();
    assert_eq!(outcome, QueuePushOutcome::Created);
    assert_eq!(controller.get_status(&token.value).await.unwrap(), Status::Queued);
}

#[tokio::test]
async fn resubmitting_identical_body_is_idempotent() {
    let controller = controller(Duration::from_secs(30)).await;
    let mut info = job("noop", json!({"n": 1}));
    let (token, _) = controller.queue_push(info.clone()).await.unwrap();

    info.token = token.clone();
    let (second_token, outcome) = controller.queue_push(info).await.unwrap();
    assert_eq!(second_token, token);
    assert_eq!(outcome, QueuePushOutcome::AlreadyExists);
}

#[tokio::test]
async fn resubmitting_with_a_different_body_conflicts() {
    let controller = controller(Duration::from_secs(30)).await;
    let mut info = job("noop", json!({"n": 1}));
    let (token, _) = controller.queue_push(info.clone()).await.unwrap();

    info.token = token;
    info.config = JobConfig::new("noop", json!({"n": 2}));
    let err = controller.queue_push(info).await.unwrap_err();
    assert!(matches!(err, ControllerError::ResubmissionConflict { .. }));
}

#[tokio::test]
async fn queue_pop_on_empty_queue_returns_none() {
    let controller = controller(Duration::from_secs(30)).await;
    assert!(controller.queue_pop("worker-a").await.unwrap().is_none());
}

#[tokio::test]
async fn at_most_one_worker_can_hold_a_token_s_lock() {
    let controller = controller(Duration::from_secs(30)).await;
    let (token, _) = controller.queue_push(job("noop", json!({}))).await.unwrap();

    let lock = controller.queue_pop("worker-a").await.unwrap().unwrap();
    assert_eq!(lock.token, token.value);

    // the token is now running and locked; a second worker must not see it
    assert!(controller.queue_pop("worker-b").await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_lock_extends_expiry() {
    let controller = controller(Duration::from_secs(30)).await;
    controller.queue_push(job("noop", json!({}))).await.unwrap();
    let lock = controller.queue_pop("worker-a").await.unwrap().unwrap();

    let refreshed = controller.refresh_lock(&lock.id).await.unwrap();
    assert!(refreshed.expires_at >= lock.expires_at);
}

#[tokio::test]
async fn refresh_of_unknown_lock_is_stale() {
    let controller = controller(Duration::from_secs(30)).await;
    let err = controller.refresh_lock("no-such-lock").await.unwrap_err();
    assert!(matches!(err, ControllerError::StaleLockRefresh));
}

#[tokio::test]
async fn registry_push_through_an_expired_lock_is_rejected() {
    // A lock TTL of zero means the lock is already expired by the time
    // we try to use it.
    let controller = controller(Duration::from_millis(0)).await;
    controller.queue_push(job("noop", json!({}))).await.unwrap();
    let lock = controller.queue_pop("worker-a").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    let err = controller
        .registry_push(&lock.id, Some(Status::Completed), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::StaleLockRegistryPush));
}

#[tokio::test]
async fn registry_push_through_a_live_lock_updates_status() {
    let controller = controller(Duration::from_secs(30)).await;
    let (token, _) = controller.queue_push(job("noop", json!({}))).await.unwrap();
    let lock = controller.queue_pop("worker-a").await.unwrap().unwrap();

    // registry_push's `status` shortcut only stamps the registry row's
    // status column; `get_status` reads the progress embedded in the
    // job's own `info`, so a caller that wants both in sync (as the
    // worker supervisor does) passes `info` alongside `status`.
    let mut info = controller.get_info(&token.value).await.unwrap();
    info.report.progress = foreman_core::domain::Progress::completed("done");
    controller
        .registry_push(&lock.id, Some(Status::Completed), Some(info))
        .await
        .unwrap();
    assert_eq!(controller.get_status(&token.value).await.unwrap(), Status::Completed);
}

#[tokio::test]
async fn release_of_an_already_released_lock_is_not_an_error() {
    let controller = controller(Duration::from_secs(30)).await;
    controller.queue_push(job("noop", json!({}))).await.unwrap();
    let lock = controller.queue_pop("worker-a").await.unwrap().unwrap();
    controller.release_lock(&lock.id).await.unwrap();
    controller.release_lock(&lock.id).await.unwrap();
}

#[tokio::test]
async fn message_for_an_unknown_token_is_silently_discarded() {
    let controller = controller(Duration::from_secs(30)).await;
    controller
        .message_push("no-such-token", Instruction::Abort, "tester", "go away")
        .await
        .unwrap();
    let messages = controller.message_get(Utc::now() - chrono::Duration::seconds(5)).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn message_for_a_known_token_is_retrievable_since_a_timestamp() {
    let controller = controller(Duration::from_secs(30)).await;
    let (token, _) = controller.queue_push(job("noop", json!({}))).await.unwrap();

    let since = Utc::now() - chrono::Duration::seconds(5);
    controller
        .message_push(&token.value, Instruction::Abort, "tester", "stop")
        .await
        .unwrap();

    let messages = controller.message_get(since).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].token, token.value);
    assert_eq!(messages[0].content, "stop");
}

#[tokio::test]
async fn get_info_on_unknown_token_fails() {
    let controller = controller(Duration::from_secs(30)).await;
    let err = controller.get_info("ghost").await.unwrap_err();
    assert!(matches!(err, ControllerError::UnknownToken(_)));
}

#[tokio::test]
async fn cleanup_requeues_a_running_job_whose_lock_expired() {
    let controller = controller(Duration::from_millis(0)).await;
    let (token, _) = controller.queue_push(job("noop", json!({}))).await.unwrap();
    controller.queue_pop("worker-a").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    controller.cleanup(true).await.unwrap();

    assert_eq!(controller.get_status(&token.value).await.unwrap(), Status::Queued);
    // requeued, so a fresh worker can pick it back up
    let lock = controller.queue_pop("worker-b").await.unwrap();
    assert!(lock.is_some());
}

#[tokio::test]
async fn cleanup_fails_a_running_job_whose_lock_expired_when_requeue_is_false() {
    let controller = controller(Duration::from_millis(0)).await;
    let (token, _) = controller.queue_push(job("noop", json!({}))).await.unwrap();
    controller.queue_pop("worker-a").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    controller.cleanup(false).await.unwrap();

    assert_eq!(controller.get_status(&token.value).await.unwrap(), Status::Failed);
}
