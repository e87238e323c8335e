//! Metrics collection for the webhook service.

use auto_oncall_core::{PipelineOutcome, SweepReport};
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Service metrics
///
/// Owns its registry so independent instances, one per router in tests, do
/// not collide on metric names.
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // Webhook intake
    pub webhook_requests_total: IntCounter,
    pub webhook_rejections_total: IntCounter,

    // Background processing
    pub pipeline_outcomes_total: IntCounterVec,
    pub pipeline_duration_seconds: Histogram,
    pub background_tasks_in_flight: IntGauge,

    // Janitor
    pub janitor_sweeps_total: IntCounter,
    pub janitor_rules_deleted_total: IntCounter,
    pub janitor_failures_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        use prometheus::{
            register_histogram_with_registry, register_int_counter_vec_with_registry,
            register_int_counter_with_registry, register_int_gauge_with_registry,
        };

        let registry = Registry::new();

        // Process collection is only implemented for Linux
        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Arc::new(Self {
            webhook_requests_total: register_int_counter_with_registry!(
                "webhook_requests_total",
                "Total webhook requests received",
                registry
            )?,
            webhook_rejections_total: register_int_counter_with_registry!(
                "webhook_rejections_total",
                "Webhook requests rejected with 400",
                registry
            )?,

            pipeline_outcomes_total: register_int_counter_vec_with_registry!(
                "pipeline_outcomes_total",
                "Background pipeline outcomes by label",
                &["outcome"],
                registry
            )?,
            pipeline_duration_seconds: register_histogram_with_registry!(
                "pipeline_duration_seconds",
                "Time from acceptance to pipeline outcome",
                vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 30.0],
                registry
            )?,
            background_tasks_in_flight: register_int_gauge_with_registry!(
                "background_tasks_in_flight",
                "Accepted deliveries still being processed",
                registry
            )?,

            janitor_sweeps_total: register_int_counter_with_registry!(
                "janitor_sweeps_total",
                "Completed routing rule sweeps",
                registry
            )?,
            janitor_rules_deleted_total: register_int_counter_with_registry!(
                "janitor_rules_deleted_total",
                "Expired routing rules removed",
                registry
            )?,
            janitor_failures_total: register_int_counter_with_registry!(
                "janitor_failures_total",
                "Sweeps or rule deletions that failed",
                registry
            )?,

            registry,
        }))
    }

    pub fn record_outcome(&self, outcome: &PipelineOutcome) {
        self.pipeline_outcomes_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.janitor_sweeps_total.inc();
        self.janitor_rules_deleted_total.inc_by(report.deleted as u64);
        self.janitor_failures_total.inc_by(report.failed as u64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
