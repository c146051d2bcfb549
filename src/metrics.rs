//! Prometheus counters for the orchestration core, exposed in text format
//! at `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder,
};

pub static CHECKOUT_SESSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "syncra_checkout_sessions_total",
        "Checkout sessions created, by provider",
        &["provider"]
    )
    .expect("register checkout sessions counter")
});

pub static WEBHOOKS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "syncra_webhooks_received_total",
        "Payment notifications received, by provider",
        &["provider"]
    )
    .expect("register webhooks received counter")
});

pub static WEBHOOKS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "syncra_webhooks_rejected_total",
        "Payment notifications rejected before processing, by reason",
        &["reason"]
    )
    .expect("register webhooks rejected counter")
});

pub static ORDERS_FULFILLED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "syncra_orders_fulfilled_total",
        "Orders committed and fulfilled exactly once"
    )
    .expect("register orders fulfilled counter")
});

pub static ORDERS_DUPLICATE: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "syncra_orders_duplicate_total",
        "Redelivered notifications acknowledged without reprocessing"
    )
    .expect("register duplicate orders counter")
});

pub static DISPATCH_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "syncra_dispatch_failures_total",
        "Post-purchase notification deliveries that failed"
    )
    .expect("register dispatch failures counter")
});

pub static VISITS_RECORDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "syncra_visits_recorded_total",
        "Visit records appended by the tracking endpoint"
    )
    .expect("register visits counter")
});

/// Renders the default registry in Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_register_and_render() {
        ORDERS_FULFILLED.inc();
        WEBHOOKS_RECEIVED.with_label_values(&["stripe"]).inc();

        let text = render().expect("render metrics");
        assert!(text.contains("syncra_orders_fulfilled_total"));
        assert!(text.contains("syncra_webhooks_received_total"));
    }
}
