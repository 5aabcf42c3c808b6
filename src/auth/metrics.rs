use axum::{routing::get, Router};
use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Counters for the Farcaster login bridge
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthMetrics;

const PREFIX: &str = "farcaster_auth";

impl AuthMetrics {
    /// Record a parsed login request by mode (`quick` / `siwf`)
    pub fn request_received(&self, mode: &str) {
        counter!(format!("{}.requests.total", PREFIX)).increment(1);
        counter!(format!("{}.requests.{}", PREFIX, mode)).increment(1);
    }

    /// Record how a request ended (`created`, `existing`, or an HTTP status class)
    pub fn outcome(&self, outcome: &str) {
        counter!(format!("{}.outcome.{}", PREFIX, outcome)).increment(1);
    }

    /// Profile row could not be written after its auth user was created
    pub fn profile_insert_failed(&self) {
        counter!(format!("{}.profile_insert_failures", PREFIX)).increment(1);
    }

    /// Another request registered the same FID first
    pub fn registration_race_lost(&self) {
        counter!(format!("{}.registration_races_lost", PREFIX)).increment(1);
    }
}

/// Installs the process-wide Prometheus recorder backing the counters above.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// `GET /metrics` in the Prometheus text format
pub fn metrics_routes(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}
