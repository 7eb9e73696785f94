use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::{parse_category, ApiError};
use crate::models::content::CategoryQuery;
use crate::services::AppState;

/// GET /api/v1/catalog/islands
pub async fn list_islands(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&query)?;
    Ok(Json(json!(state.catalog.islands_by_category(category))))
}

/// GET /api/v1/catalog/islands/{id}
pub async fn get_island(
    State(state): State<Arc<AppState>>,
    Path(island_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .island(&island_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("island not found: {}", island_id)))
}

/// GET /api/v1/catalog/islands/{id}/modules
pub async fn list_island_modules(
    State(state): State<Arc<AppState>>,
    Path(island_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.catalog.island(&island_id).is_none() {
        return Err(ApiError::not_found(format!("island not found: {}", island_id)));
    }
    Ok(Json(json!(state.catalog.modules_of_island(&island_id))))
}

/// GET /api/v1/catalog/modules/{id}
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(module_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .module(&module_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("module not found: {}", module_id)))
}

/// GET /api/v1/catalog/challenges
pub async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&query)?;
    Ok(Json(json!(state.catalog.challenges_by_category(category))))
}

/// GET /api/v1/catalog/challenges/{id}
pub async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .challenge(&challenge_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("challenge not found: {}", challenge_id)))
}

/// GET /api/v1/catalog/exercises
pub async fn list_exercises(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&query)?;
    Ok(Json(json!(state.catalog.exercises_by_category(category))))
}

/// GET /api/v1/catalog/exercises/{id}
pub async fn get_exercise(
    State(state): State<Arc<AppState>>,
    Path(exercise_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .exercise(&exercise_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("exercise not found: {}", exercise_id)))
}

/// GET /api/v1/catalog/items?category=
///
/// Without a category every entry is listed, islands first.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = match parse_category(&query)? {
        Some(category) => state.catalog.by_category(category),
        None => state
            .catalog
            .islands()
            .iter()
            .filter_map(|island| state.catalog.item(&island.id))
            .chain(state.catalog.modules().iter().filter_map(|m| state.catalog.item(&m.id)))
            .chain(
                state
                    .catalog
                    .challenges()
                    .iter()
                    .filter_map(|c| state.catalog.item(&c.id)),
            )
            .chain(
                state
                    .catalog
                    .exercises()
                    .iter()
                    .filter_map(|e| state.catalog.item(&e.id)),
            )
            .collect(),
    };

    Ok(Json(json!({ "count": items.len(), "items": items })))
}
