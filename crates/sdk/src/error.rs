// SDK error types - a thin restatement of the controller's own error
// taxonomy so embedding services can match on the semantic
// cases they care about without depending on foreman-core's port error
// types directly.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("resubmission conflict: token {token} already has a different originalBody")]
    ResubmissionConflict { token: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
