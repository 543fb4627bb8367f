use std::time::Instant;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::error::AppError;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub store_operations_total: IntCounterVec,
    pub store_operation_latency_seconds: HistogramVec,
    pub batch_rollbacks_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let store_operations_total = IntCounterVec::new(
            Opts::new(
                "store_operations_total",
                "Total service operations by outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid store_operations_total metric");

        let store_operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "store_operation_latency_seconds",
                "Latency of service operations in seconds",
            ),
            &["operation", "outcome"],
        )
        .expect("valid store_operation_latency_seconds metric");

        let batch_rollbacks_total = IntCounterVec::new(
            Opts::new(
                "batch_rollbacks_total",
                "Write batches rolled back after a failed item",
            ),
            &["operation"],
        )
        .expect("valid batch_rollbacks_total metric");

        registry
            .register(Box::new(store_operations_total.clone()))
            .expect("register store_operations_total");
        registry
            .register(Box::new(store_operation_latency_seconds.clone()))
            .expect("register store_operation_latency_seconds");
        registry
            .register(Box::new(batch_rollbacks_total.clone()))
            .expect("register batch_rollbacks_total");

        Self {
            registry,
            store_operations_total,
            store_operation_latency_seconds,
            batch_rollbacks_total,
        }
    }

    pub fn observe<T>(&self, operation: &str, started: Instant, result: &Result<T, AppError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(AppError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };

        self.store_operation_latency_seconds
            .with_label_values(&[operation, outcome])
            .observe(started.elapsed().as_secs_f64());
        self.store_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
