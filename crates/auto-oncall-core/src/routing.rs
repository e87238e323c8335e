//! # Routing Rule Synthesis
//!
//! Builds the routing rule that pages the resolved actor for an event.
//!
//! The remote system has no notion of expiry, so the expiry is encoded in the
//! rule name: `auto-<repo>-<discriminator>-<actor>-<ttlEpochSeconds>`. Two
//! deliveries for the same repository, change and actor within the same second
//! produce the same name, which the gateway uses to detect duplicates.

use crate::identity::ResolvedActor;
use crate::webhook::GitHubEvent;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Prefix of every rule name this service creates
pub const ROUTING_RULE_PREFIX: &str = "auto";

const EPOCH_DIGITS: usize = 10;

/// Criteria kind requiring every condition to match
pub const MATCH_ALL_CONDITIONS: &str = "match-all-conditions";

/// How long a synthesised rule is meant to stay in force
pub const DEFAULT_ROUTING_RULE_TTL: Duration = Duration::from_secs(3600);

/// Characters of the head commit SHA used to tell pushes apart
pub const COMMIT_DISCRIMINATOR_LENGTH: usize = 5;

// ============================================================================
// Core Types
// ============================================================================

/// A single alert-description condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCondition {
    pub value: String,
    pub negate: bool,
}

impl MatchCondition {
    /// Condition matching alerts that mention `value`
    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            negate: false,
        }
    }
}

/// Everything needed to render the escalation and routing rule requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRuleSpec {
    name: String,
    user_id: String,
    match_conditions: Vec<MatchCondition>,
    cluster_tag: Option<String>,
    rule_kind: &'static str,
}

impl RoutingRuleSpec {
    /// Build a spec, rejecting an empty name, user or condition list.
    pub fn new(
        name: impl Into<String>,
        user_id: impl Into<String>,
        match_conditions: Vec<MatchCondition>,
        cluster_tag: Option<String>,
    ) -> Result<Self, RoutingError> {
        let name = name.into();
        let user_id = user_id.into();

        if name.is_empty() {
            return Err(RoutingError::EmptyName);
        }
        if user_id.is_empty() {
            return Err(RoutingError::MissingUser);
        }
        if match_conditions.is_empty() {
            return Err(RoutingError::NoConditions);
        }

        Ok(Self {
            name,
            user_id,
            match_conditions,
            cluster_tag,
            rule_kind: MATCH_ALL_CONDITIONS,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn match_conditions(&self) -> &[MatchCondition] {
        &self.match_conditions
    }

    pub fn cluster_tag(&self) -> Option<&str> {
        self.cluster_tag.as_deref()
    }

    pub fn rule_kind(&self) -> &'static str {
        self.rule_kind
    }
}

/// Structured form of a synthesised rule name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRuleName {
    stem: String,
    expires_at: i64,
}

impl RoutingRuleName {
    pub fn new(repository: &str, discriminator: &str, actor: &str, expires_at: i64) -> Self {
        Self {
            stem: format!("{repository}-{discriminator}-{actor}"),
            expires_at,
        }
    }

    /// Recognise a name produced by this service.
    ///
    /// Repository names and refs may contain `-`, so the stem is only
    /// required to hold the repository, discriminator and actor segments.
    /// The trailing epoch must be a ten-digit Unix timestamp.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name
            .strip_prefix(ROUTING_RULE_PREFIX)?
            .strip_prefix('-')?;
        let (stem, epoch) = rest.rsplit_once('-')?;

        if epoch.len() != EPOCH_DIGITS || !epoch.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let segments: Vec<&str> = stem.split('-').collect();
        let (first, last) = (segments.first()?, segments.last()?);
        if segments.len() < 3 || first.is_empty() || last.is_empty() {
            return None;
        }

        Some(Self {
            stem: stem.to_string(),
            expires_at: epoch.parse().ok()?,
        })
    }

    /// Expiry as Unix epoch seconds
    pub fn expires_at_epoch(&self) -> i64 {
        self.expires_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }
}

impl fmt::Display for RoutingRuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", ROUTING_RULE_PREFIX, self.stem, self.expires_at)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("Routing rule requires at least one match condition")]
    NoConditions,

    #[error("Routing rule requires an on-call user")]
    MissingUser,

    #[error("Routing rule name is empty")]
    EmptyName,
}

// ============================================================================
// Synthesis
// ============================================================================

/// Derives a [`RoutingRuleSpec`] from an event and its resolved actor
#[derive(Debug, Clone)]
pub struct RoutingRuleSynthesizer {
    ttl_seconds: i64,
}

impl RoutingRuleSynthesizer {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_seconds: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Synthesise against the current wall clock
    pub fn synthesize(
        &self,
        event: &GitHubEvent,
        actor: &ResolvedActor,
    ) -> Result<RoutingRuleSpec, RoutingError> {
        self.synthesize_at(event, actor, Utc::now())
    }

    /// Synthesise as of `now`. Pure: equal inputs give equal specs.
    pub fn synthesize_at(
        &self,
        event: &GitHubEvent,
        actor: &ResolvedActor,
        now: DateTime<Utc>,
    ) -> Result<RoutingRuleSpec, RoutingError> {
        let repository = &event.repository().name;
        let expires_at = now.timestamp().saturating_add(self.ttl_seconds);

        let (discriminator, cluster_tag) = match event {
            GitHubEvent::Push(push) => (
                push.head_commit_id
                    .chars()
                    .take(COMMIT_DISCRIMINATOR_LENGTH)
                    .collect::<String>(),
                None,
            ),
            GitHubEvent::Deployment(deployment) => (
                deployment.git_ref.clone(),
                Some(deployment.environment.clone()).filter(|env| !env.is_empty()),
            ),
        };

        let name = RoutingRuleName::new(repository, &discriminator, &actor.source_login, expires_at);

        let match_conditions = if repository.is_empty() {
            Vec::new()
        } else {
            vec![MatchCondition::contains(repository.as_str())]
        };

        RoutingRuleSpec::new(
            name.to_string(),
            actor.on_call_user_id.as_str(),
            match_conditions,
            cluster_tag,
        )
    }
}

impl Default for RoutingRuleSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTING_RULE_TTL)
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
