use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use std::sync::Arc;

use super::{sync_body, ApiError};
use crate::{
    extractors::AppJson,
    middlewares::auth::AuthUser,
    models::progress::{CompleteModuleRequest, ProgressSummary, SaveResponsesRequest},
    services::{
        progress_service::{Completion, Persisted},
        recommendation_service::recommend,
        AppState,
    },
};

fn completion_body(result: Persisted<Completion>) -> serde_json::Value {
    json!({
        "newly_completed": result.value.newly_completed,
        "progress": ProgressSummary::from(&result.value.progress),
        "sync": sync_body(result.outcome),
    })
}

/// GET /api/v1/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let progress = store.lock().await.get_progress().await;

    Ok(Json(json!(ProgressSummary::from(&progress))))
}

/// DELETE /api/v1/progress
pub async fn reset_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let result = store.lock().await.reset_all_data().await;

    Ok(Json(json!({
        "progress": ProgressSummary::from(&result.value),
        "sync": sync_body(result.outcome),
    })))
}

/// POST /api/v1/progress/modules/{id}/complete
pub async fn complete_module(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<String>,
    AppJson(req): AppJson<CompleteModuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let result = store
        .lock()
        .await
        .complete_module(&module_id, &req.island_id, req.responses)
        .await?;

    Ok(Json(completion_body(result)))
}

/// PUT /api/v1/progress/modules/{id}/responses
pub async fn save_module_responses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<String>,
    AppJson(req): AppJson<SaveResponsesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let result = store
        .lock()
        .await
        .save_module_responses(&module_id, req.responses)
        .await?;

    Ok(Json(json!({
        "progress": ProgressSummary::from(&result.value),
        "sync": sync_body(result.outcome),
    })))
}

/// POST /api/v1/progress/challenges/{id}/complete
pub async fn complete_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let result = store
        .lock()
        .await
        .complete_challenge(&challenge_id)
        .await?;

    Ok(Json(completion_body(result)))
}

/// POST /api/v1/progress/exercises/{id}/complete
pub async fn complete_exercise(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(exercise_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let result = store.lock().await.complete_exercise(&exercise_id).await?;

    Ok(Json(completion_body(result)))
}

/// GET /api/v1/recommendations
pub async fn get_recommendations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.sessions.open(&user.user_id).await;
    let progress = store.lock().await.get_progress().await;

    Ok(Json(json!(recommend(&progress, &state.catalog))))
}
