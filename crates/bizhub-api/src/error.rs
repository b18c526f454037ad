//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use bizhub_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// Status code and machine-readable code for an error kind.
pub fn status_for(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ErrorKind::Authorization => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::AlreadyProcessed => (StatusCode::CONFLICT, "ALREADY_PROCESSED"),
        ErrorKind::Expired => (StatusCode::GONE, "EXPIRED"),
        ErrorKind::BrokerUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "BROKER_UNAVAILABLE"),
        ErrorKind::PersistenceFailure
        | ErrorKind::Configuration
        | ErrorKind::Serialization
        | ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

/// Response wrapper so handlers can return `AppError` with `?`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, code) = status_for(err.kind);
        if status.is_server_error() {
            tracing::error!(kind = ?err.kind, error = %err, "Request failed");
        }

        let body = ApiErrorResponse {
            success: false,
            error: code.to_string(),
            message: err.message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_conflicts_are_distinct() {
        assert_eq!(status_for(ErrorKind::AlreadyProcessed).0, StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Expired).0, StatusCode::GONE);
        assert_eq!(
            status_for(ErrorKind::PersistenceFailure).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
