use std::sync::OnceLock;

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const AI_DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0, 160.0];

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("ai_generation_duration_seconds".to_string()),
            AI_DURATION_BUCKETS,
        )
        .context("Invalid histogram buckets")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    let _ = PROM_HANDLE.set(handle);

    describe();
    Ok(())
}

fn describe() {
    metrics::describe_counter!(
        "ai_generation_requests_total",
        "AI generation calls by prompt kind and outcome"
    );
    metrics::describe_histogram!(
        "ai_generation_duration_seconds",
        metrics::Unit::Seconds,
        "Latency of AI generation calls"
    );
    metrics::describe_counter!(
        "grade_extraction_attempts_total",
        "AI calls made while extracting a grade"
    );
    metrics::describe_counter!("grade_extraction_total", "Grade extraction runs by final status");
    metrics::describe_counter!("http_requests_total", "HTTP responses by status code");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        metrics::Unit::Seconds,
        "HTTP request latency"
    );
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
