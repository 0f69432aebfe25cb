use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson, Response},
};
use serde_json::json;
use thiserror::Error;

/// Structured error types for the vault pipeline and its HTTP surface.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    /// Ciphertext failed integrity verification during decryption.
    /// Never carries partial plaintext.
    #[error("Decryption failed: ciphertext corrupted or wrong key")]
    Authentication,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Metadata store error")]
    Store(#[from] sqlx::Error),

    /// Catch-all for unexpected errors - logs full context internally
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        VaultError::Backend(err.to_string())
    }
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            VaultError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            VaultError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            VaultError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            VaultError::Backend(ref msg) => {
                tracing::error!(error = %msg, "Backend failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "backend_error",
                    "Remote storage rejected the request".to_string(),
                )
            }
            VaultError::Authentication => {
                tracing::error!("Decryption integrity failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decryption_failed",
                    "Stored data failed integrity verification".to_string(),
                )
            }
            ref err @ (VaultError::Config(_) | VaultError::Store(_) | VaultError::Internal(_)) => {
                // Log full error server-side, return generic message to client
                tracing::error!(error = ?err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = AxumJson(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
