// SDK-facing request shape for job submission. Embedding services
// build one of these and get back the `Token` the controller minted
// (or, on idempotent resubmission, the existing one).

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub job_type: String,
    pub original_body: Value,
    pub request_body: Option<Value>,
    pub properties: Option<Value>,
    pub token: Option<String>,
}

impl SubmitRequest {
    pub fn new(job_type: impl Into<String>, original_body: Value) -> Self {
        Self {
            job_type: job_type.into(),
            original_body,
            request_body: None,
            properties: None,
            token: None,
        }
    }

    pub fn with_request_body(mut self, request_body: Value) -> Self {
        self.request_body = Some(request_body);
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Pin the token instead of letting the client mint a fresh UUID;
    /// used by callers implementing an idempotent-resubmission flow
    /// (same token, same `originalBody` in, same token back).
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Whether `submit` created a new registry record or returned the token
/// of an identical prior submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    AlreadyExists,
}
