//! # Routing Rule Janitor
//!
//! Removes routing rules, and their escalations, whose name-encoded expiry
//! has passed. Rules not named by this service are never touched.

use crate::gateway::{GatewayError, IncidentApi, RemoteRoutingRule};
use crate::routing::RoutingRuleName;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rules listed by the remote system
    pub examined: usize,
    /// Rules of ours whose expiry is at or before the sweep time
    pub expired: usize,
    /// Expired rules removed
    pub deleted: usize,
    /// Expired rules that could not be removed
    pub failed: usize,
}

pub struct RoutingRuleJanitor {
    api: Arc<dyn IncidentApi>,
}

impl RoutingRuleJanitor {
    pub fn new(api: Arc<dyn IncidentApi>) -> Self {
        Self { api }
    }

    /// Delete every expired rule as of `now`.
    ///
    /// Only a failure to list rules aborts the sweep; per-rule failures are
    /// logged and counted.
    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, GatewayError> {
        let rules = self.api.list_routing_rules().await?;
        let mut report = SweepReport {
            examined: rules.len(),
            ..SweepReport::default()
        };

        for rule in rules.iter().filter(|rule| Self::is_expired(rule, now)) {
            report.expired += 1;
            match self.remove(rule).await {
                Ok(()) => {
                    report.deleted += 1;
                    debug!(rule = %rule.name, "Removed expired routing rule");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(rule = %rule.name, error = %e, "Failed to remove expired routing rule");
                }
            }
        }

        info!(
            examined = report.examined,
            expired = report.expired,
            deleted = report.deleted,
            failed = report.failed,
            "Routing rule sweep complete"
        );

        Ok(report)
    }

    fn is_expired(rule: &RemoteRoutingRule, now: DateTime<Utc>) -> bool {
        !rule.is_default
            && RoutingRuleName::parse(&rule.name).is_some_and(|name| name.is_expired(now))
    }

    async fn remove(&self, rule: &RemoteRoutingRule) -> Result<(), GatewayError> {
        self.api.delete_routing_rule(&rule.id).await?;

        // The escalation shares the rule's name
        match self.api.delete_escalation(&rule.name).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "janitor_tests.rs"]
mod tests;
