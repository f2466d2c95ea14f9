use async_trait::async_trait;
use foreman_core::application::Backoff;
use foreman_core::domain::{Instruction, JobInfo, Lock, Message, Status, Token};
use foreman_core::port::{Controller, ControllerError, QueuePushOutcome};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

const QUEUE_PUSH_OUTCOME_HEADER: &str = "x-queue-push-outcome";

/// Proxies the `Controller` port to a remote instance speaking the REST
/// contract in `crate::server::controller_router`. Connection reuse
/// comes from `reqwest::Client`'s own pool; no custom pooling is
/// layered on top.
pub struct HttpController {
    client: Client,
    base_url: String,
    backoff: Backoff,
}

impl HttpController {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(base_url: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            backoff,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Retries a request builder closure on transient transport failure
    /// only; semantic failures returned by the closure propagate as-is
    ///.
    async fn with_retry<T, F, Fut>(&self, seed: &str, mut f: F) -> Result<T, ControllerError>
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
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn transport_err(e: reqwest::Error) -> ControllerError {
    ControllerError::Transient(e.to_string())
}

async fn parse_json<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
) -> Result<T, ControllerError> {
    resp.json::<T>()
        .await
        .map_err(|e| ControllerError::Internal(format!("malformed response body: {e}")))
}

#[async_trait]
impl Controller for HttpController {
    async fn queue_push(&self, info: JobInfo) -> Result<(Token, QueuePushOutcome), ControllerError> {
        let seed = info.token.value.clone();
        self.with_retry(&seed, || {
            let info = info.clone();
            async {
                let resp = self
                    .client
                    .post(self.url("/queue/push"))
                    .json(&json!({ "info": &info }))
                    .send()
                    .await
                    .map_err(transport_err)?;
                match resp.status() {
                    StatusCode::OK => {
                        let outcome = match resp
                            .headers()
                            .get(QUEUE_PUSH_OUTCOME_HEADER)
                            .and_then(|v| v.to_str().ok())
                        {
                            Some("already-exists") => QueuePushOutcome::AlreadyExists,
                            _ => QueuePushOutcome::Created,
                        };
                        let token: Token = parse_json(resp).await?;
                        Ok((token, outcome))
                    }
                    StatusCode::CONFLICT => Err(ControllerError::ResubmissionConflict {
                        token: info.token.value.clone(),
                    }),
                    status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
                }
            }
        })
        .await
    }

    async fn queue_pop(&self, worker_name: &str) -> Result<Option<Lock>, ControllerError> {
        self.with_retry(worker_name, || async {
            let resp = self
                .client
                .post(self.url("/queue/pop"))
                .json(&json!({ "name": worker_name }))
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => Ok(Some(parse_json(resp).await?)),
                StatusCode::NO_CONTENT => Ok(None),
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn release_lock(&self, lock_id: &str) -> Result<(), ControllerError> {
        self.with_retry(lock_id, || async {
            let resp = self
                .client
                .delete(self.url("/lock"))
                .json(&json!({ "id": lock_id }))
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => Ok(()),
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn refresh_lock(&self, lock_id: &str) -> Result<Lock, ControllerError> {
        self.with_retry(lock_id, || async {
            let resp = self
                .client
                .put(self.url("/lock"))
                .json(&json!({ "id": lock_id }))
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => parse_json(resp).await,
                StatusCode::GONE => Err(ControllerError::StaleLockRefresh),
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn get_token(&self, token: &str) -> Result<Token, ControllerError> {
        self.with_retry(token, || async {
            let resp = self
                .client
                .get(self.url("/registry/token"))
                .query(&[("token", token)])
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => parse_json(resp).await,
                StatusCode::NOT_FOUND => {
                    Err(ControllerError::UnknownToken(token.to_string()))
                }
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn get_info(&self, token: &str) -> Result<JobInfo, ControllerError> {
        self.with_retry(token, || async {
            let resp = self
                .client
                .get(self.url("/registry/info"))
                .query(&[("token", token)])
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => parse_json(resp).await,
                StatusCode::NOT_FOUND => {
                    Err(ControllerError::UnknownToken(token.to_string()))
                }
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn get_status(&self, token: &str) -> Result<Status, ControllerError> {
        self.with_retry(token, || async {
            let resp = self
                .client
                .get(self.url("/registry/status"))
                .query(&[("token", token)])
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => {
                    let text = resp
                        .text()
                        .await
                        .map_err(|e| ControllerError::Internal(e.to_string()))?;
                    parse_status(&text).ok_or_else(|| {
                        ControllerError::Internal(format!("unrecognized status: {text}"))
                    })
                }
                StatusCode::NOT_FOUND => {
                    Err(ControllerError::UnknownToken(token.to_string()))
                }
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn registry_push(
        &self,
        lock_id: &str,
        status: Option<Status>,
        info: Option<JobInfo>,
    ) -> Result<(), ControllerError> {
        self.with_retry(lock_id, || {
            let info = info.clone();
            async {
                let resp = self
                    .client
                    .put(self.url("/registry"))
                    .json(&json!({ "lockId": lock_id, "status": status, "info": &info }))
                    .send()
                    .await
                    .map_err(transport_err)?;
                match resp.status() {
                    StatusCode::OK => Ok(()),
                    StatusCode::GONE => Err(ControllerError::StaleLockRegistryPush),
                    status => {
                        Err(generic_error(status, resp.text().await.unwrap_or_default()))
                    }
                }
            }
        })
        .await
    }

    async fn message_push(
        &self,
        token: &str,
        instruction: Instruction,
        origin: &str,
        content: &str,
    ) -> Result<(), ControllerError> {
        self.with_retry(token, || async {
            let resp = self
                .client
                .post(self.url("/messages"))
                .json(&json!({
                    "token": token,
                    "instruction": instruction,
                    "origin": origin,
                    "content": content,
                }))
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => Ok(()),
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn message_get(
        &self,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Message>, ControllerError> {
        let seed = since.timestamp().to_string();
        self.with_retry(&seed, || async {
            let resp = self
                .client
                .get(self.url("/messages"))
                .query(&[("since", since.timestamp())])
                .send()
                .await
                .map_err(transport_err)?;
            match resp.status() {
                StatusCode::OK => parse_json(resp).await,
                status => Err(generic_error(status, resp.text().await.unwrap_or_default())),
            }
        })
        .await
    }

    async fn cleanup(&self, _requeue: bool) -> Result<(), ControllerError> {
        // Cleanup is a server-side maintenance concern;
        // the remote instance runs its own scheduler, so a proxy has
        // nothing useful to do here.
        Ok(())
    }
}

fn parse_status(text: &str) -> Option<Status> {
    match text {
        "queued" => Some(Status::Queued),
        "running" => Some(Status::Running),
        "aborted" => Some(Status::Aborted),
        "completed" => Some(Status::Completed),
        "failed" => Some(Status::Failed),
        _ => None,
    }
}

fn generic_error(status: StatusCode, body: String) -> ControllerError {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => ControllerError::Transient(body),
        StatusCode::BAD_REQUEST => ControllerError::UnknownJobType(body),
        _ => ControllerError::Internal(format!("{status}: {body}")),
    }
}
