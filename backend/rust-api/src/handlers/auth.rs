use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::{
    extractors::AppJson,
    middlewares::auth::bearer_token,
    models::user::{LoginRequest, ProviderLoginRequest, RegisterRequest},
    services::{auth_service::AuthError, AppState},
};

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let response = state.identity.sign_up(&req.email, &req.password).await?;
    state.sessions.open(&response.user.id).await;

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let response = state.identity.sign_in(&req.email, &req.password).await?;
    state.sessions.open(&response.user.id).await;

    Ok(Json(response))
}

/// POST /api/v1/auth/provider
pub async fn provider_login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ProviderLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let provider = req.provider.trim().to_ascii_lowercase();
    let response = state
        .identity
        .sign_in_with_provider(&provider, &req.subject, req.email.as_deref())
        .await?;
    state.sessions.open(&response.user.id).await;

    Ok(Json(response))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(AuthError::InvalidToken)?;
    let user_id = state.identity.sign_out(token).await?;
    state.sessions.close(&user_id).await;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// GET /api/v1/auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(AuthError::InvalidToken)?;
    let profile = state.identity.current_user(token).await?;

    Ok(Json(profile))
}
