//! Prometheus metrics for monitoring API performance and engine activity.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize Prometheus metrics exporter
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();

    // Configure histogram buckets for request duration (in seconds)
    let builder = builder.set_buckets_for_metric(
        Matcher::Full("http_request_duration_seconds".to_string()),
        &[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ],
    )?;

    let handle = builder.install_recorder()?;

    Ok(handle)
}

/// Middleware to record HTTP request metrics
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    // Normalize path to avoid high cardinality (replace IDs with placeholders)
    let normalized_path = normalize_path(&path);

    let response: Response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => normalized_path.clone(),
        "status" => status.clone()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => normalized_path,
        "status" => status
    )
    .record(duration);

    response
}

/// Normalize URL paths to reduce cardinality in metrics
/// Replaces UUIDs and numeric IDs with placeholders
fn normalize_path(path: &str) -> String {
    let uuid_regex =
        regex::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap();
    let number_regex = regex::Regex::new(r"/\d+").unwrap();

    let mut normalized = uuid_regex.replace_all(path, ":id").to_string();
    normalized = number_regex.replace_all(&normalized, "/:id").to_string();

    normalized
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> impl IntoResponse {
    (StatusCode::OK, handle.render())
}

/// Record a scored answer, by activity kind.
pub fn record_answer_scored(kind: &str, correct: bool) {
    let result = if correct { "correct" } else { "incorrect" };

    counter!(
        "answers_scored_total",
        "kind" => kind.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record a finalized attempt and its percentage score.
pub fn record_attempt_finalized(score: f64) {
    counter!("attempts_finalized_total").increment(1);
    histogram!("attempt_score_percent").record(score);
}

/// Record a graded review item.
pub fn record_review_graded(grade: i16) {
    counter!(
        "reviews_graded_total",
        "grade" => grade.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/attempts/550e8400-e29b-41d4-a716-446655440000"),
            "/attempts/:id"
        );
        assert_eq!(
            normalize_path("/attempts/550e8400-e29b-41d4-a716-446655440000/finish"),
            "/attempts/:id/finish"
        );
        assert_eq!(normalize_path("/reviews/123/grade"), "/reviews/:id/grade");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
