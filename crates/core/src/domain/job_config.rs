// Job Config - immutable description of the work to be done

use serde::{Deserialize, Serialize};

/// Describes the work a job performs. Immutable after submission.
///
/// `original_body` is preserved verbatim and is the sole basis for the
/// idempotent-resubmission comparison: resubmitting a
/// token with an equal `original_body` is a no-op that returns the
/// existing token; a differing body is a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Selects a registered job factory by name.
    #[serde(rename = "type")]
    pub job_type: String,

    /// Verbatim request payload as submitted.
    pub original_body: serde_json::Value,

    /// Hydrated payload with defaults applied; what the job body actually
    /// sees.
    pub request_body: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl JobConfig {
    pub fn new(job_type: impl Into<String>, original_body: serde_json::Value) -> Self {
        let request_body = original_body.clone();
        Self {
            job_type: job_type.into(),
            original_body,
            request_body,
            properties: None,
        }
    }

    pub fn with_request_body(mut self, request_body: serde_json::Value) -> Self {
        self.request_body = request_body;
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = Some(properties);
        self
    }
}
