// HTTP status mapping for the Controller and Key-Value Store surfaces
//. The bit-level contract only promises `500 text/plain`
// for controller failures; `ResubmissionConflict` gets its own `409`
// so a caller can tell a
// duplicate submission apart from an actual server error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use foreman_core::port::{ControllerError, KvError};

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl From<ControllerError> for ApiError {
    fn from(err: ControllerError) -> Self {
        let status = match err {
            ControllerError::ResubmissionConflict { .. } => StatusCode::CONFLICT,
            ControllerError::UnknownToken(_) => StatusCode::NOT_FOUND,
            ControllerError::UnknownJobType(_) => StatusCode::BAD_REQUEST,
            ControllerError::StaleLockRefresh | ControllerError::StaleLockRegistryPush => {
                StatusCode::GONE
            }
            ControllerError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ControllerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<KvError> for ApiError {
    fn from(err: KvError) -> Self {
        let status = match err {
            KvError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            KvError::Io(_) | KvError::Serialization(_) | KvError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}
