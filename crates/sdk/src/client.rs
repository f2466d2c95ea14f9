// Thin HTTP client embedding services use to submit jobs and poll status
// against a running controller, without depending on foreman-infra-sqlite
// or foreman-api-http directly. Speaks the same REST
// contract as `foreman-api-http`'s server over `reqwest`.

use crate::error::{Result, SdkError};
use crate::types::{SubmitOutcome, SubmitRequest};
use foreman_core::domain::{Instruction, JobConfig, JobInfo, Message, Status, Token};
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::json;

const QUEUE_PUSH_OUTCOME_HEADER: &str = "x-queue-push-outcome";

/// A client bound to one controller's base URL (e.g.
/// `http://127.0.0.1:9527`).
pub struct Client {
    http: HttpClient,
    base_url: String,
    host: String,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_host(base_url, "sdk-client")
    }

    /// `host` is stamped into the `JobInfo.report.host` field of every
    /// job this client submits - useful for telling submitters apart in
    /// reports when several services share one controller.
    pub fn with_host(base_url: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into(),
            host: host.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit a job. Resubmitting the same
    /// `token` with an equal `originalBody` is idempotent and returns
    /// `AlreadyExists` with the existing token; a differing
    /// body fails with `ResubmissionConflict`.
    pub async fn submit(&self, request: SubmitRequest) -> Result<(Token, SubmitOutcome)> {
        let token = match request.token {
            Some(value) => Token::new(value),
            None => Token::generate(),
        };
        let mut config = JobConfig::new(request.job_type, request.original_body);
        if let Some(body) = request.request_body {
            config = config.with_request_body(body);
        }
        if let Some(properties) = request.properties {
            config = config.with_properties(properties);
        }
        let info = JobInfo::new(token, config, self.host.clone());

        let resp = self
            .http
            .post(self.url("/queue/push"))
            .json(&json!({ "info": &info }))
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {
                let outcome = match resp
                    .headers()
                    .get(QUEUE_PUSH_OUTCOME_HEADER)
                    .and_then(|v| v.to_str().ok())
                {
                    Some("already-exists") => SubmitOutcome::AlreadyExists,
                    _ => SubmitOutcome::Created,
                };
                let token: Token = resp.json().await?;
                Ok((token, outcome))
            }
            StatusCode::CONFLICT => Err(SdkError::ResubmissionConflict {
                token: info.token.value,
            }),
            status => Err(server_error(status, resp.text().await.unwrap_or_default())),
        }
    }

    /// `getStatus`.
    pub async fn status(&self, token: &str) -> Result<Status> {
        let resp = self
            .http
            .get(self.url("/registry/status"))
            .query(&[("token", token)])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => {
                let text = resp.text().await?;
                parse_status(&text)
                    .ok_or_else(|| SdkError::Server { status: 200, body: text })
            }
            StatusCode::NOT_FOUND => Err(SdkError::UnknownToken(token.to_string())),
            status => Err(server_error(status, resp.text().await.unwrap_or_default())),
        }
    }

    /// `getInfo` - the full `JobInfo`, including `report`
    /// (progress and log).
    pub async fn info(&self, token: &str) -> Result<JobInfo> {
        let resp = self
            .http
            .get(self.url("/registry/info"))
            .query(&[("token", token)])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(resp.json().await?),
            StatusCode::NOT_FOUND => Err(SdkError::UnknownToken(token.to_string())),
            status => Err(server_error(status, resp.text().await.unwrap_or_default())),
        }
    }

    /// Send an abort instruction for `token`.
    /// Silently a no-op on the server side if the token has already been
    /// cleaned up.
    pub async fn abort(&self, token: &str, origin: &str, reason: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url("/messages"))
            .json(&json!({
                "token": token,
                "instruction": Instruction::Abort,
                "origin": origin,
                "content": reason,
            }))
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            status => Err(server_error(status, resp.text().await.unwrap_or_default())),
        }
    }

    /// Messages received since `since`;
    /// mostly useful for services that want to observe abort requests
    /// they themselves issued.
    pub async fn messages_since(&self, since: chrono::DateTime<chrono::Utc>) -> Result<Vec<Message>> {
        let resp = self
            .http
            .get(self.url("/messages"))
            .query(&[("since", since.timestamp())])
            .send()
            .await?;
        match resp.status() {
            StatusCode::OK => Ok(resp.json().await?),
            status => Err(server_error(status, resp.text().await.unwrap_or_default())),
        }
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

fn server_error(status: StatusCode, body: String) -> SdkError {
    SdkError::Server {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_recognizes_every_variant() {
        assert_eq!(parse_status("queued"), Some(Status::Queued));
        assert_eq!(parse_status("completed"), Some(Status::Completed));
        assert_eq!(parse_status("bogus"), None);
    }
}
