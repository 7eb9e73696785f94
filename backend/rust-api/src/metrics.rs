use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Remote store (MongoDB or in-memory)
    pub static ref REMOTE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "remote_operations_total",
        "Total number of remote store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref REMOTE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "remote_operation_duration_seconds",
        "Remote store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap();

    // Local cache (Redis or in-memory)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    pub static ref CACHE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "cache_operation_duration_seconds",
        "Cache operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Progress store behaviour
    pub static ref STORAGE_FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "storage_fallbacks_total",
        "Reads and writes served without the remote store",
        &["operation", "outcome"]
    )
    .unwrap();

    pub static ref RECONCILIATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reconciliations_total",
        "Pending local writes replayed against the remote store",
        &["kind", "status"]
    )
    .unwrap();

    // Business Metrics
    pub static ref COMPLETIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "completions_total",
        "First-time completions of catalog items",
        &["kind"]
    )
    .unwrap();

    pub static ref BADGES_EARNED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "badges_earned_total",
        "Badges granted",
        &["tier"]
    )
    .unwrap();

    pub static ref AUTH_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auth_events_total",
        "Sign-up, sign-in and sign-out attempts",
        &["event", "status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sessions_active",
        "Number of open user sessions"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track remote store operation with metrics
pub async fn track_remote_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    REMOTE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    REMOTE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

/// Helper: track cache operation with metrics
pub async fn track_cache_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    CACHE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

/// Record cache hit
pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

/// Record cache miss
pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}

pub fn record_fallback(operation: &str, outcome: &str) {
    STORAGE_FALLBACKS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}
