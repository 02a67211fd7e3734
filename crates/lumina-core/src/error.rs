//! Error types module
//!
//! This module provides the core error types used throughout the Lumina
//! application. All errors are unified under the `AppError` enum which can
//! represent database, storage, queue, validation, and other domain-specific
//! errors.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature. With `default-features = false`, build without the `sqlx` feature;
//! then `AppError` has no database variant and you must use other error types
//! for DB errors.

use std::io;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

use crate::models::media::Variant;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a missing derivative
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
/// This trait allows errors to self-describe their HTTP response characteristics.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DERIVATIVE_NOT_READY")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Structured details object for the response body
    fn details(&self) -> JsonValue;

    /// Whether internal detail should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Derivative not ready for media {media_id} variant {variant}")]
    DerivativeNotReady {
        media_id: Uuid,
        variant: Variant,
        queued: bool,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata per variant: (http_status, error_code, recoverable, sensitive, log_level).
/// Reduces duplication in the ErrorMetadata impl; client_message and details stay
/// per-variant for dynamic content.
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
        AppError::Queue(_) => (500, "QUEUE_ERROR", true, true, LogLevel::Error),
        AppError::ImageProcessing(_) => (500, "IMAGE_PROCESSING_ERROR", false, true, LogLevel::Error),
        AppError::InvalidInput(_) => (400, "VALIDATION_ERROR", false, false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::DerivativeNotReady { .. } => {
            (503, "DERIVATIVE_NOT_READY", true, false, LogLevel::Debug)
        }
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, false, LogLevel::Debug),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            // Internal/infra failures never leak their inner message
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Storage(_) => "A storage error occurred".to_string(),
            AppError::Queue(_) => "A queueing error occurred".to_string(),
            AppError::ImageProcessing(_) => "Media could not be processed".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "An internal error occurred".to_string()
            }
            AppError::DerivativeNotReady { variant, .. } => {
                format!("The {} derivative is not ready yet; retry shortly", variant)
            }
            other => other.to_string(),
        }
    }

    fn details(&self) -> JsonValue {
        match self {
            AppError::DerivativeNotReady {
                media_id,
                variant,
                queued,
            } => json!({
                "mediaId": media_id,
                "variant": variant.as_str(),
                "retriable": true,
                "queued": queued,
            }),
            _ => json!({}),
        }
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_carries_retriable_details() {
        let id = Uuid::new_v4();
        let err = AppError::DerivativeNotReady {
            media_id: id,
            variant: Variant::Playback,
            queued: true,
        };

        assert_eq!(err.http_status_code(), 503);
        assert_eq!(err.error_code(), "DERIVATIVE_NOT_READY");
        assert!(err.is_recoverable());

        let details = err.details();
        assert_eq!(details["mediaId"], json!(id));
        assert_eq!(details["variant"], json!("playback"));
        assert_eq!(details["retriable"], json!(true));
        assert_eq!(details["queued"], json!(true));
    }

    #[test]
    fn internal_errors_hide_detail_from_clients() {
        let err = AppError::Internal("connection pool exhausted at 10.0.0.3".to_string());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("10.0.0.3"));
    }

    #[test]
    fn validation_errors_are_client_fault() {
        let err = AppError::InvalidInput("cursor is malformed".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(!err.is_recoverable());
        assert!(!err.is_sensitive());
    }
}
