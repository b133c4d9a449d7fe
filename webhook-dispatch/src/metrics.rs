//! Prometheus counters for the dispatcher and multiplexer.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, opts, register_int_counter_vec};

pub static WEBHOOK_HITS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "webhook_hits_total",
            "Inbound webhook deliveries, by validation/parsing outcome"
        ),
        &["result"]
    )
    .expect("webhook_hits_total registration")
});

pub static WEBHOOK_PROXY_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "webhook_proxy_requests_total",
            "Requests forwarded by the webhook multiplexer"
        ),
        &["method", "status", "url"]
    )
    .expect("webhook_proxy_requests_total registration")
});
