//! Prometheus metrics for the cfddns daemon.
//!
//! All metrics carry the `cfddns` prefix and live in a registry owned by
//! [`Metrics`], exposed through `GET /metrics` on the admin surface.
//!
//! # Metrics
//!
//! - `cfddns_ip_changes_total`: Accepted public IP changes
//! - `cfddns_ip_resolve_failures_total`: Failed IP resolutions
//! - `cfddns_passes_total`: Completed reconciliation passes
//! - `cfddns_record_outcomes_total{outcome}`: Per-record pass results
//! - `cfddns_config_reloads_total{result}`: Desired-record reloads
//! - `cfddns_admin_requests_total{route,status}`: Admin API requests

use cfddns_core::SchedulerEvent;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "cfddns";

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::with_opts(Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, prometheus::Error> {
    let counter = IntCounterVec::new(Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help), labels)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Daemon metrics and the registry they are exposed from
pub struct Metrics {
    registry: Registry,
    ip_changes: IntCounter,
    ip_resolve_failures: IntCounter,
    passes: IntCounter,
    record_outcomes: IntCounterVec,
    config_reloads: IntCounterVec,
    admin_requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        Ok(Self {
            ip_changes: counter(&registry, "ip_changes_total", "Accepted public IP changes")?,
            ip_resolve_failures: counter(
                &registry,
                "ip_resolve_failures_total",
                "Failed public IP resolutions",
            )?,
            passes: counter(&registry, "passes_total", "Completed reconciliation passes")?,
            record_outcomes: counter_vec(
                &registry,
                "record_outcomes_total",
                "Per-record reconciliation results by outcome",
                &["outcome"],
            )?,
            config_reloads: counter_vec(
                &registry,
                "config_reloads_total",
                "Desired record reloads by result",
                &["result"],
            )?,
            admin_requests: counter_vec(
                &registry,
                "admin_requests_total",
                "Admin API requests by route and status code",
                &["route", "status"],
            )?,
            registry,
        })
    }

    /// Fold one scheduler event into the counters
    pub fn observe(&self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::ResolveFailed { .. } => self.ip_resolve_failures.inc(),
            SchedulerEvent::IpChanged { .. } => self.ip_changes.inc(),
            SchedulerEvent::PassCompleted(summary) => {
                self.passes.inc();
                for (outcome, count) in [
                    ("created", summary.created),
                    ("updated", summary.updated),
                    ("deleted", summary.deleted),
                    ("skipped", summary.skipped),
                    ("failed", summary.failed),
                ] {
                    self.record_outcomes
                        .with_label_values(&[outcome])
                        .inc_by(count as u64);
                }
            }
            SchedulerEvent::Reloaded { .. } => {
                self.config_reloads.with_label_values(&["success"]).inc()
            }
            SchedulerEvent::ReloadFailed { .. } => {
                self.config_reloads.with_label_values(&["failure"]).inc()
            }
            SchedulerEvent::Started { .. }
            | SchedulerEvent::IpUnchanged { .. }
            | SchedulerEvent::Stopped { .. } => {}
        }
    }

    /// Count one admin API request
    pub fn observe_admin(&self, route: &str, status: u16) {
        self.admin_requests
            .with_label_values(&[route, status.to_string().as_str()])
            .inc();
    }

    /// Render all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
    }
}
