// Route handlers for the Controller and Key-Value Store REST surfaces
//. Each handler borrows its port from its state
// struct, calls straight into it, and lets `ApiError`'s `IntoResponse`
// impl turn a typed failure into the right status code.

use crate::error::ApiError;
use crate::state::{ControllerState, KvState};
use crate::types::{
    KvEntryResponse, KvPopQuery, KvPushResponse, LockIdRequest, MessagePushRequest,
    MessagesQuery, QueuePopRequest, QueuePushRequest, RegistryPushRequest, TokenQuery,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use foreman_core::domain::{Lock, Message, Token};

// --- Controller routes ---

/// The bit-level contract is `200 Token`; whether the push
/// created a new record or returned an idempotent resubmission isn't
/// part of that body, so it rides along as a response header instead
/// (see DESIGN.md).
const QUEUE_PUSH_OUTCOME_HEADER: &str = "x-queue-push-outcome";

pub async fn queue_push(
    State(state): State<ControllerState>,
    Json(req): Json<QueuePushRequest>,
) -> Result<axum::response::Response, ApiError> {
    let (token, outcome) = state.controller.queue_push(req.info).await?;
    let outcome_str = match outcome {
        foreman_core::port::QueuePushOutcome::Created => "created",
        foreman_core::port::QueuePushOutcome::AlreadyExists => "already-exists",
    };
    let mut response = Json(token).into_response();
    response.headers_mut().insert(
        QUEUE_PUSH_OUTCOME_HEADER,
        axum::http::HeaderValue::from_static(outcome_str),
    );
    Ok(response)
}

pub async fn queue_pop(
    State(state): State<ControllerState>,
    Json(req): Json<QueuePopRequest>,
) -> Result<axum::response::Response, ApiError> {
    match state.controller.queue_pop(&req.name).await? {
        Some(lock) => Ok(Json(lock).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn release_lock(
    State(state): State<ControllerState>,
    Json(req): Json<LockIdRequest>,
) -> Result<&'static str, ApiError> {
    state.controller.release_lock(&req.id).await?;
    Ok("OK")
}

pub async fn refresh_lock(
    State(state): State<ControllerState>,
    Json(req): Json<LockIdRequest>,
) -> Result<Json<Lock>, ApiError> {
    let lock = state.controller.refresh_lock(&req.id).await?;
    Ok(Json(lock))
}

pub async fn get_token(
    State(state): State<ControllerState>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<Token>, ApiError> {
    let token = state.controller.get_token(&q.token).await?;
    Ok(Json(token))
}

pub async fn get_info(
    State(state): State<ControllerState>,
    Query(q): Query<TokenQuery>,
) -> Result<Json<foreman_core::domain::JobInfo>, ApiError> {
    let info = state.controller.get_info(&q.token).await?;
    Ok(Json(info))
}

pub async fn get_status(
    State(state): State<ControllerState>,
    Query(q): Query<TokenQuery>,
) -> Result<String, ApiError> {
    let status = state.controller.get_status(&q.token).await?;
    Ok(status.to_string())
}

pub async fn registry_push(
    State(state): State<ControllerState>,
    Json(req): Json<RegistryPushRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .controller
        .registry_push(&req.lock_id, req.status, req.info)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn message_push(
    State(state): State<ControllerState>,
    Json(req): Json<MessagePushRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .controller
        .message_push(&req.token, req.instruction, &req.origin, &req.content)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn message_get(
    State(state): State<ControllerState>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let since = chrono::DateTime::from_timestamp(q.since, 0).unwrap_or_else(chrono::Utc::now);
    let messages = state.controller.message_get(since).await?;
    Ok(Json(messages))
}

// --- Key-Value Store routes ---
//
// A per-key `?pop` is a plain read-then-delete here, not an atomic
// store-level operation: the `KvStore` contract only guarantees
// atomicity for `next(pop=true)`, which picks an arbitrary element.

pub async fn kv_get(
    State(state): State<KvState>,
    Path(key): Path<String>,
    Query(q): Query<KvPopQuery>,
) -> Result<axum::response::Response, ApiError> {
    match state.kv.read(&key).await? {
        Some(value) => {
            if q.pop {
                state.kv.delete(&key).await?;
            }
            Ok(Json(KvEntryResponse { key, value }).into_response())
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub async fn kv_next(
    State(state): State<KvState>,
    Query(q): Query<KvPopQuery>,
) -> Result<axum::response::Response, ApiError> {
    match state.kv.next(q.pop).await? {
        Some((key, value)) => Ok(Json(KvEntryResponse { key, value }).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn kv_write(
    State(state): State<KvState>,
    Path(key): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    state.kv.write(&key, value).await?;
    Ok(StatusCode::OK)
}

pub async fn kv_push(
    State(state): State<KvState>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<KvPushResponse>, ApiError> {
    let key = state.kv.push(value).await?;
    Ok(Json(KvPushResponse { key }))
}

pub async fn kv_delete(
    State(state): State<KvState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.kv.delete(&key).await?;
    Ok(StatusCode::OK)
}

pub async fn kv_keys(State(state): State<KvState>) -> Result<Json<Vec<String>>, ApiError> {
    let keys = state.kv.keys().await?;
    Ok(Json(keys))
}
