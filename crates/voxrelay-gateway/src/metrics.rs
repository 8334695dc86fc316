//! Prometheus metrics recording and endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::GatewayState;

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

pub const REQUESTS_TOTAL: &str = "voxrelay_pipeline_requests_total";
pub const ERRORS_TOTAL: &str = "voxrelay_pipeline_errors_total";
pub const DURATION_SECONDS: &str = "voxrelay_pipeline_duration_seconds";
pub const STAGE_SECONDS: &str = "voxrelay_pipeline_stage_seconds";

/// Count an incoming `POST /api`, whatever its outcome.
pub fn record_request() {
    metrics::counter!(REQUESTS_TOTAL).increment(1);
}

/// End-to-end duration of a successful run.
pub fn record_pipeline(duration_secs: f64) {
    metrics::histogram!(DURATION_SECONDS).record(duration_secs);
}

/// Record one vendor stage (transcription, completion, synthesis).
pub fn record_stage(stage: &'static str, duration_secs: f64) {
    let labels = [("stage", stage)];
    metrics::histogram!(STAGE_SECONDS, &labels).record(duration_secs);
}

/// Record an error of a given kind.
pub fn record_error(kind: &str) {
    let labels = [("kind", kind.to_string())];
    metrics::counter!(ERRORS_TOTAL, &labels).increment(1);
}

pub async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_prometheus_recorder() {
        // Only one recorder can be installed per process.
        let handle = install_prometheus_recorder().unwrap();
        record_request();
        record_pipeline(0.5);
        record_stage("synthesis", 0.25);
        record_error("rate_limited");

        let output = handle.render();
        assert!(output.contains("voxrelay_pipeline_requests_total 1"));
        assert!(output.contains("voxrelay_pipeline_duration_seconds"));
        assert!(output.contains(r#"voxrelay_pipeline_stage_seconds_count{stage="synthesis"} 1"#));
        assert!(output.contains(r#"voxrelay_pipeline_errors_total{kind="rate_limited"}"#));
    }

    #[test]
    fn test_record_stage_does_not_panic() {
        // Falls back to the no-op recorder when none is installed
        record_stage("completion", 0.123);
    }

    #[test]
    fn test_record_error_does_not_panic() {
        record_error("rate_limited");
    }
}
