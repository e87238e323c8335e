//! Request bodies for the OpsGenie escalation and routing rule APIs.
//!
//! Bodies are rendered by serialising these types, so repository names and
//! logins are always JSON-escaped.

use crate::routing::RoutingRuleSpec;
use serde::{Deserialize, Serialize};

/// Times the escalation re-notifies before giving up
pub const ESCALATION_REPEAT_COUNT: u32 = 20;

/// Minutes between escalation repeats
pub const ESCALATION_WAIT_INTERVAL_MINUTES: u32 = 5;

/// Team that owns the escalations this service creates
pub const DEFAULT_OWNER_TEAM: &str = "ops_team";

// ============================================================================
// Escalation
// ============================================================================

/// `POST /v2/escalations` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRequest {
    pub name: String,
    pub rules: Vec<EscalationRule>,
    pub owner_team: TeamRef,
    pub repeat: RepeatPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationRule {
    pub delay: Delay,
    pub recipient: Recipient,
    pub notify_type: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delay {
    pub time_amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(rename = "type")]
    pub kind: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatPolicy {
    pub wait_interval: u32,
    pub count: u32,
    pub reset_recipient_states: bool,
    pub close_alert_after_all: bool,
}

impl EscalationRequest {
    /// Single step: notify the user, escalate while unacknowledged.
    pub fn from_spec(spec: &RoutingRuleSpec, owner_team: &str) -> Self {
        Self {
            name: spec.name().to_string(),
            rules: vec![EscalationRule {
                delay: Delay { time_amount: 1 },
                recipient: Recipient {
                    kind: "user".to_string(),
                    username: spec.user_id().to_string(),
                },
                notify_type: "default".to_string(),
                condition: "if-not-acked".to_string(),
            }],
            owner_team: TeamRef {
                name: owner_team.to_string(),
            },
            repeat: RepeatPolicy {
                wait_interval: ESCALATION_WAIT_INTERVAL_MINUTES,
                count: ESCALATION_REPEAT_COUNT,
                reset_recipient_states: false,
                close_alert_after_all: false,
            },
        }
    }
}

// ============================================================================
// Routing Rule
// ============================================================================

/// `POST /v2/teams/{team}/routing-rules` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRuleRequest {
    pub name: String,
    pub order: u32,
    pub criteria: Criteria,
    pub notify: NotifyTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(rename = "type")]
    pub kind: String,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub not: bool,
    pub operation: String,
    pub expected_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RoutingRuleRequest {
    /// The cluster tag, when present, matches on the alert message and comes
    /// first; each match condition matches on the alert description.
    pub fn from_spec(spec: &RoutingRuleSpec) -> Self {
        let cluster = spec.cluster_tag().map(|tag| Condition {
            field: "message".to_string(),
            not: false,
            operation: "contains".to_string(),
            expected_value: tag.to_string(),
        });

        let conditions = cluster
            .into_iter()
            .chain(spec.match_conditions().iter().map(|c| Condition {
                field: "description".to_string(),
                not: c.negate,
                operation: "contains".to_string(),
                expected_value: c.value.clone(),
            }))
            .collect();

        Self {
            name: spec.name().to_string(),
            order: 0,
            criteria: Criteria {
                kind: spec.rule_kind().to_string(),
                conditions,
            },
            notify: NotifyTarget {
                name: spec.name().to_string(),
                kind: "escalation".to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "templates_tests.rs"]
mod tests;
