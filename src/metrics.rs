//! Prometheus metrics for section and deployment operations.

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::MetricsError;

/// Prometheus metrics exposed on `/metrics`.
pub struct Metrics {
    registry: Registry,
    /// Number of stored section records, refreshed on every listing.
    pub sections: Gauge,
    /// Pipeline operations by name and outcome.
    pub operations_total: IntCounterVec,
    /// Wall time of checker and reload commands.
    pub command_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let sections = Gauge::new("haproxy_sections", "Number of stored configuration sections")
            .map_err(prometheus_err)?;

        let operations_total = IntCounterVec::new(
            Opts::new("haproxy_operations_total", "Pipeline operations by outcome"),
            &["operation", "outcome"],
        )
        .map_err(prometheus_err)?;

        let command_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "haproxy_command_duration_seconds",
                "Time taken by external HAProxy commands in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["command"],
        )
        .map_err(prometheus_err)?;

        registry
            .register(Box::new(sections.clone()))
            .map_err(prometheus_err)?;
        registry
            .register(Box::new(operations_total.clone()))
            .map_err(prometheus_err)?;
        registry
            .register(Box::new(command_duration_seconds.clone()))
            .map_err(prometheus_err)?;

        Ok(Self {
            registry,
            sections,
            operations_total,
            command_duration_seconds,
        })
    }

    /// Counts one operation. `ok` selects the `success` or `failure` outcome.
    pub fn record(&self, operation: &str, ok: bool) {
        let outcome = if ok { "success" } else { "failure" };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn observe_command(&self, command: &str, seconds: f64) {
        self.command_duration_seconds
            .with_label_values(&[command])
            .observe(seconds);
    }

    pub fn set_sections(&self, count: usize) {
        self.sections.set(count as f64);
    }

    /// Returns the metrics in Prometheus text format.
    pub fn gather(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(prometheus_err)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Prometheus(e.to_string()))
    }
}

fn prometheus_err(e: prometheus::Error) -> MetricsError {
    MetricsError::Prometheus(e.to_string())
}
