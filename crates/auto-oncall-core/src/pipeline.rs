//! # Webhook Pipeline
//!
//! Orchestrates one delivery through
//! `Received → Verified → Decoded → Filtered → Resolved → Synthesized → Submitted`.
//!
//! [`WebhookPipeline::accept`] runs on the request path and only covers
//! signature verification. [`WebhookPipeline::process`] runs the remaining
//! stages in the background; it never returns an error, every failure is
//! logged with its stage and reported as [`PipelineOutcome::Halted`].

use crate::gateway::{EnsureOutcome, EscalationGateway, GatewayError};
use crate::identity::{IdentityError, IdentityResolver};
use crate::policy::{DropReason, FilterDecision, RoutingPolicy};
use crate::routing::{RoutingError, RoutingRuleSynthesizer};
use crate::webhook::{
    EventKind, GitHubEvent, SignatureVerifier, WebhookEnvelope, WebhookError, WebhookRequest,
};
use std::fmt;
use tracing::{debug, error, field, info, instrument, warn, Span};

// ============================================================================
// Core Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Verified,
    Decoded,
    Filtered,
    Resolved,
    Synthesized,
    Submitted,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Decoded => "decoded",
            Self::Filtered => "filtered",
            Self::Resolved => "resolved",
            Self::Synthesized => "synthesized",
            Self::Submitted => "submitted",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a background run
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The routing policy rejected the event
    Dropped(DropReason),
    /// Escalation and routing rule are in place
    Submitted(EnsureOutcome),
    /// A stage failed; nothing further was attempted
    Halted(PipelineError),
}

impl PipelineOutcome {
    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dropped(_) => "dropped",
            Self::Submitted(EnsureOutcome::Created) => "created",
            Self::Submitted(EnsureOutcome::AlreadyInPlace) => "already_in_place",
            Self::Halted(e) => match e.cause {
                PipelineFailure::Identity(IdentityError::UserNotFound { .. }) => "user_not_found",
                _ => "failed",
            },
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// A stage failure
#[derive(Debug, thiserror::Error)]
#[error("pipeline halted at {stage}: {cause}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub cause: PipelineFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineFailure {
    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl PipelineError {
    fn at(stage: PipelineStage, cause: impl Into<PipelineFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Per-delivery orchestration over immutable, shared components
#[derive(Debug)]
pub struct WebhookPipeline {
    verifier: SignatureVerifier,
    policy: RoutingPolicy,
    resolver: IdentityResolver,
    synthesizer: RoutingRuleSynthesizer,
    gateway: EscalationGateway,
}

impl WebhookPipeline {
    pub fn new(
        verifier: SignatureVerifier,
        policy: RoutingPolicy,
        resolver: IdentityResolver,
        synthesizer: RoutingRuleSynthesizer,
        gateway: EscalationGateway,
    ) -> Self {
        Self {
            verifier,
            policy,
            resolver,
            synthesizer,
            gateway,
        }
    }

    /// Verify a received delivery.
    ///
    /// Returns `Ok(None)` for a correctly signed delivery of an event kind
    /// that is not routed.
    #[instrument(skip(self, request), fields(delivery_id = %request.delivery_id(), event_type = %request.event_type()))]
    pub fn accept(&self, request: WebhookRequest) -> Result<Option<WebhookEnvelope>, WebhookError> {
        if !self.verifier.verify(request.signature(), &request.body) {
            warn!(stage = %PipelineStage::Received, "Webhook signature verification failed");
            return Err(WebhookError::InvalidSignature);
        }

        let Some(kind) = EventKind::from_header(request.event_type()) else {
            info!("Ignoring unsupported event type");
            return Ok(None);
        };

        debug!(stage = %PipelineStage::Verified, "Webhook signature verified");
        Ok(Some(WebhookEnvelope::verified(request, kind)))
    }

    /// Run the post-verification stages for `envelope`.
    ///
    /// `repository` and `actor` are recorded on the span once the payload is
    /// decoded, so every later log line carries them.
    #[instrument(
        skip(self, envelope),
        fields(
            delivery_id = %envelope.delivery_id(),
            event_kind = %envelope.event_kind(),
            repository = field::Empty,
            actor = field::Empty,
        )
    )]
    pub async fn process(&self, envelope: WebhookEnvelope) -> PipelineOutcome {
        match self.run(&envelope).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e.cause {
                    PipelineFailure::Identity(IdentityError::UserNotFound { login }) => warn!(
                        stage = %e.stage,
                        actor = %login,
                        error = %e.cause,
                        "No on-call user for actor; routing rule not created"
                    ),
                    PipelineFailure::Webhook(_) => warn!(
                        stage = %e.stage,
                        error = %e.cause,
                        "Discarding undecodable webhook payload"
                    ),
                    _ => error!(
                        stage = %e.stage,
                        error = %e.cause,
                        "Webhook pipeline failed"
                    ),
                }
                PipelineOutcome::Halted(e)
            }
        }
    }

    async fn run(&self, envelope: &WebhookEnvelope) -> Result<PipelineOutcome, PipelineError> {
        let event = GitHubEvent::decode(envelope.event_kind(), envelope.raw_payload())
            .map_err(|e| PipelineError::at(PipelineStage::Decoded, e))?;

        let span = Span::current();
        span.record("repository", field::display(event.repository()));
        span.record("actor", event.actor_login());

        debug!(
            stage = %PipelineStage::Decoded,
            repository = %event.repository(),
            git_ref = %event.git_ref(),
            actor = %event.actor_login(),
            "Decoded webhook event"
        );

        if let FilterDecision::Drop(reason) = self.policy.evaluate(&event) {
            info!(
                stage = %PipelineStage::Filtered,
                repository = %event.repository(),
                reason = reason.as_str(),
                "{reason}"
            );
            return Ok(PipelineOutcome::Dropped(reason));
        }

        let actor = self
            .resolver
            .resolve_event(&event)
            .await
            .map_err(|e| PipelineError::at(PipelineStage::Resolved, e))?;

        let spec = self
            .synthesizer
            .synthesize(&event, &actor)
            .map_err(|e| PipelineError::at(PipelineStage::Synthesized, e))?;

        let outcome = self
            .gateway
            .ensure(&spec)
            .await
            .map_err(|e| PipelineError::at(PipelineStage::Submitted, e))?;

        info!(
            stage = %PipelineStage::Submitted,
            repository = %event.repository(),
            actor = %actor.source_login,
            user = %actor.on_call_user_id,
            rule = %spec.name(),
            outcome = outcome.as_str(),
            "Routing rule for on-call user is in place"
        );

        Ok(PipelineOutcome::Submitted(outcome))
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
