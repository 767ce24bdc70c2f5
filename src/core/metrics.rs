use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder once per process. Counters increment
/// into a no-op recorder until this runs, so callers never need to check.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("http_requests_total", "HTTP requests by method, path and status");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds"
    );
    metrics::describe_counter!(
        "quiz_attempts_started_total",
        "Quiz attempts started, labeled by whether the attempt was resumed"
    );
    metrics::describe_counter!(
        "quiz_submissions_total",
        "Quiz submissions, labeled on_time or late"
    );
    metrics::describe_counter!(
        "question_replacements_completed_total",
        "Questions replaced from generator callbacks"
    );
    metrics::describe_counter!(
        "question_replacements_failed_total",
        "Question replacement jobs that ended in failure"
    );
    metrics::describe_counter!(
        "generation_jobs_expired_total",
        "Generation jobs failed by the sweeper after their deadline"
    );
    metrics::describe_counter!(
        "attempts_abandoned_total",
        "Stale in-progress attempts abandoned by the sweeper"
    );
}
