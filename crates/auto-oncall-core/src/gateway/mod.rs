//! # Escalation Gateway
//!
//! Idempotently creates the escalation and team routing rule for a
//! [`RoutingRuleSpec`] in the incident-management system.
//!
//! The escalation is always written first: a routing rule that notifies a
//! missing escalation is rejected by the remote system.

use crate::routing::RoutingRuleSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

mod templates;

pub use templates::{
    Condition, Criteria, Delay, EscalationRequest, EscalationRule, NotifyTarget, Recipient,
    RepeatPolicy, RoutingRuleRequest, TeamRef, DEFAULT_OWNER_TEAM, ESCALATION_REPEAT_COUNT,
    ESCALATION_WAIT_INTERVAL_MINUTES,
};

#[cfg(test)]
pub(crate) mod fake;

// ============================================================================
// Core Types
// ============================================================================

/// Routing rule as listed by the remote team API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRoutingRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub criteria: serde_json::Value,
}

/// Result of a successful [`EscalationGateway::ensure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The routing rule was created by this call
    Created,
    /// A routing rule with the same name already existed
    AlreadyInPlace,
}

impl EnsureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyInPlace => "already_in_place",
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{operation} failed: {message}")]
    ExecutionFailed {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned unexpected status {status}")]
    UnexpectedResponseCode { operation: &'static str, status: u16 },

    #[error("Routing rule '{name}' already exists")]
    RoutingRuleDuplication { name: String },

    #[error("{operation} returned malformed response: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },
}

impl GatewayError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExecutionFailed { .. } => true,
            Self::UnexpectedResponseCode { status, .. } => *status == 429 || *status >= 500,
            Self::RoutingRuleDuplication { .. } | Self::MalformedResponse { .. } => false,
        }
    }

    /// Benign errors mean the desired remote state is already in place
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::RoutingRuleDuplication { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnexpectedResponseCode { status: 404, .. })
    }
}

// ============================================================================
// Interface Traits
// ============================================================================

/// Low-level incident-management API
///
/// One method per remote endpoint. Implementations map transport failures to
/// `ExecutionFailed` and out-of-set statuses to `UnexpectedResponseCode`.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// Create an escalation. An already existing escalation is success.
    async fn create_escalation(&self, request: &EscalationRequest) -> Result<(), GatewayError>;

    /// List the team's routing rules
    async fn list_routing_rules(&self) -> Result<Vec<RemoteRoutingRule>, GatewayError>;

    /// Create a team routing rule
    async fn create_routing_rule(&self, request: &RoutingRuleRequest) -> Result<(), GatewayError>;

    /// Delete a team routing rule by id
    async fn delete_routing_rule(&self, id: &str) -> Result<(), GatewayError>;

    /// Delete an escalation by name
    async fn delete_escalation(&self, name: &str) -> Result<(), GatewayError>;
}

// ============================================================================
// Gateway
// ============================================================================

/// Writes escalations and routing rules for synthesised specs
#[derive(Clone)]
pub struct EscalationGateway {
    api: Arc<dyn IncidentApi>,
    owner_team: String,
}

impl EscalationGateway {
    pub fn new(api: Arc<dyn IncidentApi>, owner_team: impl Into<String>) -> Self {
        Self {
            api,
            owner_team: owner_team.into(),
        }
    }

    /// Ensure the escalation and routing rule for `spec` exist.
    ///
    /// A routing rule that already exists is reported as
    /// [`EnsureOutcome::AlreadyInPlace`], so repeated calls succeed.
    #[instrument(skip(self, spec), fields(rule = %spec.name()))]
    pub async fn ensure(&self, spec: &RoutingRuleSpec) -> Result<EnsureOutcome, GatewayError> {
        self.create_escalation(spec).await?;

        match self.create_routing_rule(spec).await {
            Ok(()) => Ok(EnsureOutcome::Created),
            Err(e) if e.is_benign() => {
                info!(error = %e, "Routing rule already in place");
                Ok(EnsureOutcome::AlreadyInPlace)
            }
            Err(e) => Err(e),
        }
    }

    /// Create the escalation paging `spec`'s user
    pub async fn create_escalation(&self, spec: &RoutingRuleSpec) -> Result<(), GatewayError> {
        let request = EscalationRequest::from_spec(spec, &self.owner_team);
        self.api.create_escalation(&request).await?;
        debug!(escalation = %request.name, "Escalation in place");
        Ok(())
    }

    /// Create the routing rule for `spec`.
    ///
    /// Fails with `RoutingRuleDuplication` when a rule of the same name is
    /// already listed. The list-then-create sequence is not atomic.
    pub async fn create_routing_rule(&self, spec: &RoutingRuleSpec) -> Result<(), GatewayError> {
        let existing = self.api.list_routing_rules().await?;
        if existing.iter().any(|rule| rule.name == spec.name()) {
            return Err(GatewayError::RoutingRuleDuplication {
                name: spec.name().to_string(),
            });
        }

        self.api
            .create_routing_rule(&RoutingRuleRequest::from_spec(spec))
            .await
    }
}

impl std::fmt::Debug for EscalationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationGateway")
            .field("owner_team", &self.owner_team)
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
