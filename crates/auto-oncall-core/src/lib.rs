//! # auto-oncall core
//!
//! Core business logic for the auto-oncall webhook service.
//!
//! This crate turns a signed GitHub webhook delivery into an OpsGenie escalation
//! and team routing rule that pages the engineer responsible for the change:
//!
//! - [`webhook`] verifies the `X-Hub-Signature` HMAC and decodes push and
//!   deployment payloads
//! - [`policy`] decides whether an event is routed at all
//! - [`identity`] maps the GitHub actor to an on-call user
//! - [`routing`] synthesises a deterministic, time-bounded routing rule
//! - [`gateway`] idempotently writes the escalation and routing rule
//! - [`pipeline`] orchestrates the stages for one delivery
//! - [`janitor`] removes routing rules whose encoded TTL has passed
//!
//! ## Architecture
//!
//! Remote systems sit behind the [`identity::CommitAuthorLookup`] and
//! [`gateway::IncidentApi`] traits; the reqwest-backed implementations live in
//! [`adapters`] and are injected at startup.
//!
//! ## Usage
//!
//! ```rust
//! use auto_oncall_core::RepositoryRef;
//!
//! let repository = RepositoryRef::new("bar", "owner/bar");
//! assert_eq!(repository.owner(), Some("owner"));
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Repository Types
// ============================================================================

/// Repository reference as carried by GitHub webhook payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Short repository name, e.g. `bar`
    pub name: String,

    /// Owner-qualified name, e.g. `owner/bar`
    pub full_name: String,
}

impl RepositoryRef {
    /// Create new repository reference
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
        }
    }

    /// Get owner part of the full name
    pub fn owner(&self) -> Option<&str> {
        self.full_name.split_once('/').map(|(owner, _)| owner)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

// ============================================================================
// Secret Handling
// ============================================================================

/// Secret string that is zeroed on drop and never printed.
///
/// Used for the webhook secret and the API tokens. `Debug` and `Serialize`
/// both emit a redacted placeholder; the value is only reachable through
/// [`SecretString::expose_secret`].
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Placeholder emitted instead of the secret value
    pub const REDACTED: &'static str = "<REDACTED>";

    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Get secret as bytes
    pub fn expose_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretString")
            .field("length", &self.inner.len())
            .field("value", &Self::REDACTED)
            .finish()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Webhook verification and decoding
pub mod webhook;

/// Branch and environment routing policy
pub mod policy;

/// GitHub actor to on-call user resolution
pub mod identity;

/// Routing rule synthesis
pub mod routing;

/// Escalation and routing rule synchronisation
pub mod gateway;

/// Per-delivery orchestration
pub mod pipeline;

/// Removal of expired routing rules
pub mod janitor;

/// reqwest-backed implementations of the remote API traits
pub mod adapters;

// Re-export key types for convenience
pub use gateway::{EnsureOutcome, EscalationGateway, GatewayError, IncidentApi};
pub use identity::{CommitAuthorLookup, IdentityError, IdentityResolver, ResolvedActor};
pub use janitor::{RoutingRuleJanitor, SweepReport};
pub use pipeline::{PipelineError, PipelineOutcome, PipelineStage, WebhookPipeline};
pub use policy::{DropReason, FilterDecision, RoutingPolicy};
pub use routing::{MatchCondition, RoutingError, RoutingRuleSpec, RoutingRuleSynthesizer};
pub use webhook::{
    DeploymentEvent, EventKind, GitHubEvent, PushEvent, SignatureVerifier, WebhookEnvelope,
    WebhookError, WebhookHeaders, WebhookRequest,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
