use crate::engine::session::ACTIVE_CONNECTIONS;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::atomic::Ordering;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref CONNECTION_GAUGE: Gauge = Gauge::new(
        "slowdrip_active_connections",
        "Number of probe connections currently held open"
    )
    .expect("metric can be created");
    pub static ref SESSIONS_STARTED: IntCounter = IntCounter::new(
        "slowdrip_sessions_started_total",
        "Total number of probe sessions started"
    )
    .expect("metric can be created");
    pub static ref SESSIONS_COMPLETED: IntCounter = IntCounter::new(
        "slowdrip_sessions_completed_total",
        "Total number of probe sessions that finished the full cycle"
    )
    .expect("metric can be created");
    /// Includes cancelled sessions.
    pub static ref SESSIONS_FAILED: IntCounter = IntCounter::new(
        "slowdrip_sessions_failed_total",
        "Total number of probe sessions that ended in an error"
    )
    .expect("metric can be created");
    pub static ref HEADER_BYTES_SENT: IntCounter = IntCounter::new(
        "slowdrip_header_bytes_sent_total",
        "Total number of header bytes accepted by the transport"
    )
    .expect("metric can be created");
}

pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(CONNECTION_GAUGE.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_STARTED.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_COMPLETED.clone()));
    let _ = REGISTRY.register(Box::new(SESSIONS_FAILED.clone()));
    let _ = REGISTRY.register(Box::new(HEADER_BYTES_SENT.clone()));
}

fn update_metrics() {
    let count = ACTIVE_CONNECTIONS.load(Ordering::SeqCst) as f64;
    CONNECTION_GAUGE.set(count);
}

pub fn render_metrics() -> String {
    update_metrics();

    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| "# Error: Invalid UTF8".to_string())
}
