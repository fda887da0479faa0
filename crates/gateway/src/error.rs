//! Command error taxonomy
//!
//! Errors here are returned to callers inside acks, never thrown to the
//! transport layer.

use serde::Serialize;

use deskhub_shared::StoreError;

/// Machine-readable error codes carried in failed acks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Missing or malformed required fields
    InvalidPayload,
    /// Referenced conversation/agent absent in storage
    NotFound,
    /// Presence status not in the enumerated set
    InvalidStatus,
    /// Storage or internal failure
    ServerError,
}

/// A failed command acknowledgement
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct AckError {
    pub code: ErrorCode,
    pub message: String,
}

impl AckError {
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidPayload,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: message.into(),
        }
    }

    pub fn invalid_status(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidStatus,
            message: message.into(),
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ServerError,
            message: message.into(),
        }
    }
}

impl From<StoreError> for AckError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "storage failure during command dispatch");
        AckError::server_error("internal storage error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::InvalidPayload).unwrap(),
            r#""invalid_payload""#
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::InvalidStatus).unwrap(),
            r#""invalid_status""#
        );
    }

    #[test]
    fn test_store_error_collapses_to_server_error() {
        let err: AckError = StoreError::Database("connection reset".to_string()).into();
        assert_eq!(err.code, ErrorCode::ServerError);
        // Internal detail must not leak into the ack message
        assert!(!err.message.contains("connection reset"));
    }
}
