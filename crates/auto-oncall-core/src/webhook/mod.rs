//! # Webhook Processing Module
//!
//! Handles GitHub webhook header parsing, signature verification and
//! decoding of the push and deployment payloads the service routes on.

use crate::ValidationError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

mod decoder;
mod signature;

pub use decoder::{DeploymentEvent, GitHubEvent, PushEvent};
pub use signature::{
    compute_signature_header, verify_signature, SignatureVerifier, SIGNATURE_HEADER_LENGTH,
    SIGNATURE_PREFIX,
};

// ============================================================================
// Core Types
// ============================================================================

/// Raw HTTP request data from GitHub webhooks
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub headers: WebhookHeaders,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl WebhookRequest {
    /// Create new webhook request
    pub fn new(headers: WebhookHeaders, body: Bytes) -> Self {
        Self {
            headers,
            body,
            received_at: Utc::now(),
        }
    }

    /// Get event type from headers
    pub fn event_type(&self) -> &str {
        &self.headers.event_type
    }

    /// Get delivery ID from headers
    pub fn delivery_id(&self) -> &str {
        &self.headers.delivery_id
    }

    /// Get signature from headers
    pub fn signature(&self) -> &str {
        &self.headers.signature
    }
}

/// GitHub-specific HTTP headers required for processing
#[derive(Debug, Clone)]
pub struct WebhookHeaders {
    pub event_type: String,         // X-GitHub-Event
    pub delivery_id: String,        // X-GitHub-Delivery
    pub signature: String,          // X-Hub-Signature
    pub user_agent: Option<String>, // User-Agent
}

impl WebhookHeaders {
    /// Parse headers from HTTP header map.
    ///
    /// Keys are matched in either their canonical or lower-case spelling.
    pub fn from_http_headers(headers: &HashMap<String, String>) -> Result<Self, ValidationError> {
        let event_type = Self::required(headers, "x-github-event", "X-GitHub-Event")?;
        let delivery_id = Self::required(headers, "x-github-delivery", "X-GitHub-Delivery")?;
        let signature = Self::required(headers, "x-hub-signature", "X-Hub-Signature")?;

        let user_agent = headers
            .get("user-agent")
            .or_else(|| headers.get("User-Agent"))
            .cloned();

        let headers = Self {
            event_type,
            delivery_id,
            signature,
            user_agent,
        };

        headers.validate()?;
        Ok(headers)
    }

    fn required(
        headers: &HashMap<String, String>,
        lower: &str,
        canonical: &str,
    ) -> Result<String, ValidationError> {
        headers
            .get(lower)
            .or_else(|| headers.get(canonical))
            .cloned()
            .ok_or_else(|| ValidationError::Required {
                field: canonical.to_string(),
            })
    }

    /// Validate header values
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.event_type.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "X-GitHub-Event".to_string(),
            });
        }

        if self.delivery_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "X-GitHub-Delivery".to_string(),
            });
        }

        if self.signature.is_empty() {
            return Err(ValidationError::Required {
                field: "X-Hub-Signature".to_string(),
            });
        }

        Ok(())
    }
}

/// Event kinds the service routes on.
///
/// Any other `X-GitHub-Event` value is acknowledged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    Deployment,
}

impl EventKind {
    /// Map an `X-GitHub-Event` header value to a supported kind
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "push" => Some(Self::Push),
            "deployment" => Some(Self::Deployment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Deployment => "deployment",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery whose signature has been verified and whose event kind is
/// supported. Immutable once created.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    delivery_id: String,
    signature: String,
    event_kind: EventKind,
    raw_payload: Bytes,
    received_at: DateTime<Utc>,
}

impl WebhookEnvelope {
    /// Wrap a verified request. Only the pipeline creates envelopes.
    pub(crate) fn verified(request: WebhookRequest, event_kind: EventKind) -> Self {
        Self {
            delivery_id: request.headers.delivery_id,
            signature: request.headers.signature,
            event_kind,
            raw_payload: request.body,
            received_at: request.received_at,
        }
    }

    pub fn delivery_id(&self) -> &str {
        &self.delivery_id
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    pub fn raw_payload(&self) -> &Bytes {
        &self.raw_payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while accepting or decoding a delivery
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed {event_kind} payload: {message}")]
    MalformedPayload {
        event_kind: EventKind,
        message: String,
    },
}

impl WebhookError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        false
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedPayload { .. } => "malformed_payload",
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
