// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("token not found: {0}")]
    TokenNotFound(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("metadata record '{0}' already set")]
    MetadataAlreadySet(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
