//! Periodic sweep of expired routing rules.

use crate::metrics::ServiceMetrics;
use auto_oncall_core::RoutingRuleJanitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run one sweep at the current time and record its result
pub async fn sweep_once(janitor: &RoutingRuleJanitor, metrics: &ServiceMetrics) {
    match janitor.sweep(chrono::Utc::now()).await {
        Ok(report) => {
            metrics.record_sweep(&report);
            info!(
                examined = report.examined,
                expired = report.expired,
                deleted = report.deleted,
                failed = report.failed,
                "Routing rule sweep finished"
            );
        }
        Err(e) => {
            metrics.janitor_failures_total.inc();
            error!(error = %e, "Routing rule sweep failed");
        }
    }
}

/// Sweep every `interval` until the task is dropped.
///
/// The first sweep runs immediately.
pub async fn run_janitor(
    janitor: RoutingRuleJanitor,
    interval: Duration,
    metrics: Arc<ServiceMetrics>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_seconds = interval.as_secs(), "Routing rule janitor started");
    loop {
        ticker.tick().await;
        sweep_once(&janitor, &metrics).await;
    }
}

#[cfg(test)]
#[path = "janitor_tests.rs"]
mod tests;
