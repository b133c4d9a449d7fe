//! Prometheus instrumentation for outbound GitHub calls.

use once_cell::sync::Lazy;
use prometheus::{GaugeVec, IntCounterVec, opts, register_gauge_vec, register_int_counter_vec};

pub static GH_API_CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        opts!(
            "gh_api_calls_total",
            "Total GitHub REST/GraphQL API calls made by the controller"
        ),
        &["owner", "status"]
    )
    .expect("gh_api_calls_total registration")
});

pub static GH_RATE_LIMIT_REMAINING: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        opts!(
            "gh_rate_limit_remaining",
            "GitHub API rate limit remaining, per owner"
        ),
        &["owner"]
    )
    .expect("gh_rate_limit_remaining registration")
});

pub static GH_RATE_LIMIT_TOTAL: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        opts!(
            "gh_rate_limit_total",
            "GitHub API rate limit ceiling, per owner"
        ),
        &["owner"]
    )
    .expect("gh_rate_limit_total registration")
});

/// Records one outbound call's outcome and, when present, the
/// `x-ratelimit-*` response headers. `owner` defaults to `"unknown"`
/// when the client wasn't constructed with one (e.g. in unit tests),
/// so instrumentation never panics on a missing label.
pub fn observe_response(owner: &str, status: u16, headers: &reqwest::header::HeaderMap) {
    let owner = if owner.is_empty() { "unknown" } else { owner };
    GH_API_CALLS_TOTAL
        .with_label_values(&[owner, &status.to_string()])
        .inc();

    if let Some(remaining) = header_f64(headers, "x-ratelimit-remaining") {
        GH_RATE_LIMIT_REMAINING
            .with_label_values(&[owner])
            .set(remaining);
    }
    if let Some(limit) = header_f64(headers, "x-ratelimit-limit") {
        GH_RATE_LIMIT_TOTAL.with_label_values(&[owner]).set(limit);
    }
}

fn header_f64(headers: &reqwest::header::HeaderMap, name: &str) -> Option<f64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn observes_status_and_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));

        observe_response("acme", 200, &headers);

        assert_eq!(
            GH_API_CALLS_TOTAL.with_label_values(&["acme", "200"]).get(),
            1
        );
        assert_eq!(
            GH_RATE_LIMIT_REMAINING.with_label_values(&["acme"]).get(),
            4999.0
        );
    }

    #[test]
    fn empty_owner_falls_back_to_unknown_label() {
        observe_response("", 404, &HeaderMap::new());
        assert_eq!(
            GH_API_CALLS_TOTAL
                .with_label_values(&["unknown", "404"])
                .get(),
            1
        );
    }
}
