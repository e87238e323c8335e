//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use auto_oncall_core::adapters::AdapterConfigError;
use auto_oncall_core::{ValidationError, WebhookError};
use tracing::warn;

/// Body returned for every rejected delivery
pub const INVALID_REQUEST_MESSAGE: &str = "invalid request";

/// Webhook handler errors
///
/// Every variant maps to `400 Bad Request` with the same sanitized body so a
/// caller cannot tell a bad signature from a missing header. The specific
/// cause is logged server-side.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Missing or empty required header
    #[error("Invalid headers: {0}")]
    InvalidHeaders(#[from] ValidationError),

    /// Rejected by signature verification
    #[error("Rejected: {0}")]
    Rejected(#[from] WebhookError),

    /// Webhook path requested with a method other than POST
    #[error("Method {method} not allowed")]
    MethodNotAllowed { method: String },
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        warn!(error = %self, "Rejecting webhook request");

        let body = serde_json::json!({
            "error": INVALID_REQUEST_MESSAGE,
        });

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid adapter configuration: {0}")]
    Adapter(#[from] AdapterConfigError),
}
