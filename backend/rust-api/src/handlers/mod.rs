use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ProgressError, ValidationError};
use crate::metrics;
use crate::models::content::{Category, CategoryQuery};
use crate::services::auth_service::AuthError;
use crate::services::progress_service::WriteOutcome;
use crate::services::AppState;

pub mod auth;
pub mod catalog;
pub mod progress;
pub mod settings;

#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        message: String,
        field: Option<String>,
    },
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            field: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest {
            message: err.message,
            field: Some(err.field),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::bad_request(format!("Validation error: {}", err))
    }
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::Validation(e) => e.into(),
            ProgressError::NotFound { .. } => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::EmailTaken => ApiError::Conflict(err.to_string()),
            AuthError::UnsupportedProvider(_) => ApiError::bad_request(err.to_string()),
            AuthError::Backend(message) => {
                tracing::error!("Identity backend failure: {}", message);
                ApiError::Internal("Authentication is temporarily unavailable".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, field) = match self {
            ApiError::BadRequest { message, field } => (StatusCode::BAD_REQUEST, message, field),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message, None),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message, None),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message, None),
        };
        let mut body = json!({
            "message": message,
            "status": status.as_u16()
        });
        if let Some(field) = field {
            body["field"] = json!(field);
        }
        (status, Json(body)).into_response()
    }
}

/// Parses the optional `?category=` filter.
pub(crate) fn parse_category(query: &CategoryQuery) -> Result<Option<Category>, ApiError> {
    query
        .category
        .as_deref()
        .map(|raw| {
            raw.parse::<Category>().map_err(|message| ApiError::BadRequest {
                message,
                field: Some("category".to_string()),
            })
        })
        .transpose()
}

/// `sync` block attached to every mutation response.
pub(crate) fn sync_body(outcome: WriteOutcome) -> serde_json::Value {
    json!({
        "outcome": outcome,
        "notice": outcome.notice(),
    })
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (remote, cache) = futures::future::join(
        probe("remote_store", Duration::from_secs(1), async {
            state.remote.ping().await.map_err(|e| e.to_string())
        }),
        probe("local_cache", Duration::from_millis(500), async {
            state.cache.ping().await.map_err(|e| e.to_string())
        }),
    )
    .await;

    let all_healthy = [&remote, &cache]
        .iter()
        .all(|result| result.get("status").and_then(|v| v.as_str()) == Some("healthy"));

    let mut dependencies = serde_json::Map::new();
    dependencies.insert("remote_store".to_string(), json!(remote));
    dependencies.insert("local_cache".to_string(), json!(cache));

    let (status_code, status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "service": "ikigai-api",
            "version": env!("CARGO_PKG_VERSION"),
            "storage_backend": state.config.storage_backend,
            "active_sessions": state.sessions.active_count().await,
            "dependencies": dependencies
        })),
    )
}

async fn probe<F>(
    name: &str,
    limit: Duration,
    check: F,
) -> serde_json::Map<String, serde_json::Value>
where
    F: std::future::Future<Output = Result<(), String>>,
{
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(limit, check).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(e));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert(
                "error".to_string(),
                json!(format!("{} timeout after {}ms", name, limit.as_millis())),
            );
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic auth against `METRICS_AUTH`
/// (`username:password`).
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
