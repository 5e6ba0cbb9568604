//! Prometheus metrics for config updates and reloads.

use chrono::{DateTime, Utc};
use prometheus::{Counter, CounterVec, Gauge, Opts, Registry};

use crate::error::ServerError;

/// Terminal outcome of one update transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Rejected by validation; nothing was touched.
    Rejected,
    /// Write or reload failed; the previous file was restored.
    Failed,
    /// File written and reload acknowledged.
    Committed,
}

impl UpdateOutcome {
    fn as_label(self) -> &'static str {
        match self {
            UpdateOutcome::Rejected => "rejected",
            UpdateOutcome::Failed => "failed",
            UpdateOutcome::Committed => "committed",
        }
    }
}

/// Prometheus metrics for the sidecar.
pub struct Metrics {
    /// Registry for all metrics.
    registry: Registry,
    /// Update transactions by outcome.
    pub updates_total: CounterVec,
    /// Restorations of the previous file that themselves failed.
    pub restore_failures_total: Counter,
    /// Unix time of the last committed update.
    pub last_update_timestamp_seconds: Gauge,
    /// Reloads handled by the reload consumer, by result.
    pub reloads_total: CounterVec,
    /// Number of modules in the live configuration.
    pub modules: Gauge,
}

fn prom_err(e: prometheus::Error) -> ServerError {
    ServerError::PrometheusFailed(e.to_string())
}

impl Metrics {
    /// Creates a new metrics instance with its own registry.
    pub fn new() -> Result<Self, ServerError> {
        let registry = Registry::new();

        let updates_total = CounterVec::new(
            Opts::new(
                "sidecar_config_updates_total",
                "Config update transactions by outcome",
            ),
            &["result"],
        )
        .map_err(prom_err)?;

        let restore_failures_total = Counter::new(
            "sidecar_config_restore_failures_total",
            "Failed attempts to restore the previous config file",
        )
        .map_err(prom_err)?;

        let last_update_timestamp_seconds = Gauge::new(
            "sidecar_config_last_update_timestamp_seconds",
            "Unix time of the last committed config update",
        )
        .map_err(prom_err)?;

        let reloads_total = CounterVec::new(
            Opts::new("probe_config_reloads_total", "Config reloads by result"),
            &["result"],
        )
        .map_err(prom_err)?;

        let modules = Gauge::new(
            "probe_config_modules",
            "Number of probe modules in the live configuration",
        )
        .map_err(prom_err)?;

        registry
            .register(Box::new(updates_total.clone()))
            .map_err(prom_err)?;
        registry
            .register(Box::new(restore_failures_total.clone()))
            .map_err(prom_err)?;
        registry
            .register(Box::new(last_update_timestamp_seconds.clone()))
            .map_err(prom_err)?;
        registry
            .register(Box::new(reloads_total.clone()))
            .map_err(prom_err)?;
        registry.register(Box::new(modules.clone())).map_err(prom_err)?;

        Ok(Self {
            registry,
            updates_total,
            restore_failures_total,
            last_update_timestamp_seconds,
            reloads_total,
            modules,
        })
    }

    /// Records the terminal outcome of an update.
    pub fn record_update(&self, outcome: UpdateOutcome) {
        self.updates_total
            .with_label_values(&[outcome.as_label()])
            .inc();
    }

    /// Records a failed restoration of the previous file.
    pub fn record_restore_failure(&self) {
        self.restore_failures_total.inc();
    }

    /// Updates the last committed update gauge.
    pub fn set_last_update(&self, ts: DateTime<Utc>) {
        self.last_update_timestamp_seconds
            .set(ts.timestamp_millis() as f64 / 1000.0);
    }

    /// Records a reload handled by the reload consumer.
    pub fn record_reload(&self, success: bool, module_count: Option<usize>) {
        let label = if success { "success" } else { "failure" };
        self.reloads_total.with_label_values(&[label]).inc();
        if let Some(count) = module_count {
            self.modules.set(count as f64);
        }
    }

    /// Returns the metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, ServerError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(prom_err)?;
        String::from_utf8(buffer).map_err(|e| ServerError::PrometheusFailed(e.to_string()))
    }
}
