//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers descriptions for every metric the service emits.
pub fn describe() {
    metrics::describe_counter!("orders_created_total", "Orders recorded");
    metrics::describe_counter!(
        "orders_failed_total",
        "Orders failed by a rejected reservation or the stale order sweep"
    );
    metrics::describe_counter!("orders_payed_total", "Orders payed");
    metrics::describe_counter!("orders_cancelled_total", "Orders cancelled");
    metrics::describe_counter!(
        "outbox_events_published_total",
        "Outbox events acknowledged by the broker"
    );
    metrics::describe_counter!(
        "outbox_publish_failures_total",
        "Outbox events whose publish failed or timed out"
    );
    metrics::describe_counter!(
        "outbox_events_skipped_total",
        "Outbox events deferred behind an earlier failure of the same order"
    );
    metrics::describe_histogram!(
        "outbox_batch_duration_seconds",
        Unit::Seconds,
        "Time spent relaying one outbox batch"
    );
    metrics::describe_counter!("db_requests_total", "Database requests by operation");
    metrics::describe_histogram!(
        "db_request_duration_seconds",
        Unit::Seconds,
        "Database request latency by operation and status"
    );
}

/// GET /metrics — returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
