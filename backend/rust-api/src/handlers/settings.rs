use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde_json::json;
use std::sync::Arc;

use super::{sync_body, ApiError};
use crate::{extractors::AppJson, middlewares::auth::AuthUser, services::AppState};

/// GET /api/v1/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let settings = store.lock().await.get_user_settings().await;

    Ok(Json(settings))
}

/// PUT /api/v1/settings
///
/// The raw body is checked field by field so that the error names the
/// offending key.
pub async fn save_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    AppJson(body): AppJson<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let result = store.lock().await.save_user_settings(body).await?;

    Ok(Json(json!({
        "settings": result.value,
        "sync": sync_body(result.outcome),
    })))
}
