//! HTTP error response conversion
//!
//! **Preferred handler pattern:** Return `Result<impl IntoResponse, HttpAppError>`.
//! Use `AppError` (or types that implement `Into<AppError>`) for errors and `?`
//! so they become `HttpAppError` and render consistently (status, body, logging).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use lumina_core::{AppError, ErrorMetadata, LogLevel};
use lumina_processing::DerivativeError;
use lumina_queue::QueueError;
use lumina_storage::StorageError;

/// Wire shape of every error response: a machine-readable code, a human
/// message, a details object. Internal detail never leaks.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code for programmatic handling
    pub code: String,
    pub message: String,
    pub details: JsonValue,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
}

/// Wrapper type for AppError to implement IntoResponse.
/// Necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (type from lumina-core).
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            // A stored relative_path that escapes the sandbox is corrupt
            // server state, not a client mistake
            StorageError::PathEscape(msg) => {
                AppError::Storage(format!("path escapes storage root: {}", msg))
            }
            StorageError::Io(err) => AppError::Storage(format!("IO error: {}", err)),
        };
        HttpAppError(app)
    }
}

impl From<QueueError> for HttpAppError {
    fn from(err: QueueError) -> Self {
        HttpAppError(AppError::Queue(err.to_string()))
    }
}

impl From<DerivativeError> for HttpAppError {
    fn from(err: DerivativeError) -> Self {
        let app = match err {
            DerivativeError::UnsupportedVariant(variant) => {
                AppError::InvalidInput(format!("Unsupported derivative variant: {}", variant))
            }
            DerivativeError::Path(msg) => AppError::Storage(msg),
            DerivativeError::Io(msg) => AppError::Storage(msg),
            DerivativeError::Transcode(msg) => AppError::ImageProcessing(msg),
        };
        HttpAppError(app)
    }
}

fn log_error(error: &AppError) {
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, code = error.error_code(), "Request error");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, code = error.error_code(), "Request error");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, code = error.error_code(), "Request error");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = Json(ErrorResponse {
            code: app_error.error_code().to_string(),
            message: app_error.client_message(),
            details: app_error.details(),
            recoverable: app_error.is_recoverable(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn storage_path_escape_maps_to_internal_storage_error() {
        let HttpAppError(app) = StorageError::PathEscape("../etc".into()).into();
        assert!(matches!(app, AppError::Storage(_)));
        assert_eq!(app.http_status_code(), 500);
    }

    #[test]
    fn unsupported_variant_maps_to_validation_error() {
        let HttpAppError(app) = DerivativeError::UnsupportedVariant("original".into()).into();
        assert_eq!(app.error_code(), "VALIDATION_ERROR");
        assert_eq!(app.http_status_code(), 400);
    }

    #[test]
    fn queue_errors_surface_as_recoverable_internal() {
        let HttpAppError(app) = QueueError::Broker("connection refused".into()).into();
        assert_eq!(app.error_code(), "QUEUE_ERROR");
        assert!(app.is_recoverable());
        assert!(!app.client_message().contains("connection refused"));
    }

    #[test]
    fn error_response_shape_has_code_message_details() {
        let err = AppError::DerivativeNotReady {
            media_id: Uuid::new_v4(),
            variant: lumina_core::models::Variant::Playback,
            queued: true,
        };
        let body = ErrorResponse {
            code: err.error_code().to_string(),
            message: err.client_message(),
            details: err.details(),
            recoverable: err.is_recoverable(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "DERIVATIVE_NOT_READY");
        assert_eq!(json["recoverable"], true);
        assert_eq!(json["details"]["retriable"], true);
        assert!(json["message"].as_str().is_some());
    }
}
