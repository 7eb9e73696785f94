use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Request count and latency per method, route and status.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| normalize_path(req.uri().path()));

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Fallback label for requests that matched no route. Content ids are
/// free-form, so anything past the resource name collapses to `{id}`.
fn normalize_path(path: &str) -> String {
    const RESOURCES: [&str; 5] = ["islands", "modules", "challenges", "exercises", "progress"];

    let mut normalized = Vec::new();
    let mut after_resource = false;

    for segment in path.split('/') {
        if after_resource && !segment.is_empty() && !is_action(segment) {
            normalized.push("{id}");
            after_resource = false;
            continue;
        }
        after_resource = RESOURCES.contains(&segment);
        normalized.push(segment);
    }

    normalized.join("/")
}

fn is_action(segment: &str) -> bool {
    matches!(segment, "complete" | "responses" | "modules" | "challenges" | "exercises")
}
