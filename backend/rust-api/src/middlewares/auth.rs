use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::ApiError;
use crate::services::auth_service::AuthError;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JwtClaims {
    pub sub: String, // user_id
    pub sid: String, // auth session id, revoked on sign-out
    pub exp: usize,
    pub iat: usize,
}

/// Caller identity placed in request extensions by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Invalid,
    Expired,
    InvalidSignature,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Invalid => write!(f, "Invalid token"),
            TokenError::Expired => write!(f, "Token expired"),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for TokenError {}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| TokenError::Invalid)
    }

    /// Checks the signature, then `exp` against `now` (unix seconds) rather
    /// than the system clock, so tokens follow the service's injected clock.
    pub fn validate_token(&self, token: &str, now: i64) -> Result<JwtClaims, TokenError> {
        use jsonwebtoken::errors::ErrorKind;

        let mut validation = Validation::default();
        validation.validate_exp = false;

        let claims = decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid,
            })?;

        if claims.exp as i64 <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects requests without a live bearer token and attaches [`AuthUser`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers).ok_or(AuthError::InvalidToken)?;

    let user = state.identity.authenticate(token).await.map_err(|e| {
        tracing::warn!("Authentication failed: {}", e);
        e
    })?;

    tracing::debug!(user_id = %user.user_id, "Authenticated request");

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> JwtClaims {
        let now = chrono::Utc::now().timestamp();
        JwtClaims {
            sub: "user123".to_string(),
            sid: "session-1".to_string(),
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        }
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = JwtService::new("test-secret");
        let claims = claims(3600);

        let token = service.generate_token(&claims).unwrap();
        let validated = service.validate_token(&token, claims.iat as i64).unwrap();

        assert_eq!(validated, claims);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = JwtService::new("secret-a")
            .generate_token(&claims(3600))
            .unwrap();
        assert_eq!(
            JwtService::new("secret-b").validate_token(&token, chrono::Utc::now().timestamp()),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = JwtService::new("test-secret");
        let token = service.generate_token(&claims(-3600)).unwrap();
        assert_eq!(
            service.validate_token(&token, chrono::Utc::now().timestamp()),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_expiry_follows_the_given_time() {
        let service = JwtService::new("test-secret");
        // Issued and expiring long before the wall clock.
        let claims = JwtClaims {
            sub: "user123".to_string(),
            sid: "session-1".to_string(),
            exp: 10_003_600,
            iat: 10_000_000,
        };
        let token = service.generate_token(&claims).unwrap();

        assert_eq!(service.validate_token(&token, 10_000_000), Ok(claims.clone()));
        assert_eq!(
            service.validate_token(&token, 10_003_600),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
