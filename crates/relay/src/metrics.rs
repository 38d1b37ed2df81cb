use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref POLL_CYCLES_TOTAL: IntCounter = IntCounter::new(
        "alertanio_poll_cycles_total",
        "Total number of completed poll cycles."
    )
    .unwrap();
    pub static ref ALERTS_FETCHED_TOTAL: IntCounter = IntCounter::new(
        "alertanio_alerts_fetched_total",
        "Total number of alerts fetched from Alerta."
    )
    .unwrap();
    pub static ref ALERTS_NOTIFIED_TOTAL: IntCounter = IntCounter::new(
        "alertanio_alerts_notified_total",
        "Total number of alerts delivered to Zulip."
    )
    .unwrap();
    pub static ref ALERTS_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "alertanio_alerts_skipped_total",
            "Total number of alerts filtered out, by reason."
        ),
        &["reason"]
    )
    .unwrap();
    pub static ref DISPATCH_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "alertanio_dispatch_failures_total",
        "Total number of messages Zulip did not accept."
    )
    .unwrap();
    pub static ref BLACKOUTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "alertanio_blackouts_created_total",
        "Total number of blackouts created on Alerta."
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(POLL_CYCLES_TOTAL.clone()),
            Box::new(ALERTS_FETCHED_TOTAL.clone()),
            Box::new(ALERTS_NOTIFIED_TOTAL.clone()),
            Box::new(ALERTS_SKIPPED_TOTAL.clone()),
            Box::new(DISPATCH_FAILURES_TOTAL.clone()),
            Box::new(BLACKOUTS_CREATED_TOTAL.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!("Failed to register metric: {}", e);
            }
        }
    });
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> String {
    register_metrics();

    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
