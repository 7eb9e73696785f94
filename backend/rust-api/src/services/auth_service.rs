use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::AUTH_EVENTS_TOTAL;
use crate::middlewares::auth::{AuthUser, JwtClaims, JwtService};
use crate::models::user::{AuthResponse, ProviderIdentity, UserProfile, UserRecord};
use crate::services::storage::{auth_session_key, CacheError, LocalCache, RemoteUnavailable, UserDirectory};
use crate::utils::time::Clock;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Identity provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Identity backend error: {0}")]
    Backend(String),
}

impl From<RemoteUnavailable> for AuthError {
    fn from(e: RemoteUnavailable) -> Self {
        AuthError::Backend(e.to_string())
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        AuthError::Backend(e.to_string())
    }
}

/// Account sign-up, sign-in and token checks.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError>;

    /// Finds or creates the account for `(provider, subject)`.
    async fn sign_in_with_provider(
        &self,
        provider: &str,
        subject: &str,
        email: Option<&str>,
    ) -> Result<AuthResponse, AuthError>;

    /// Revokes the token's session. Returns the user id it belonged to.
    async fn sign_out(&self, token: &str) -> Result<String, AuthError>;

    async fn current_user(&self, token: &str) -> Result<UserProfile, AuthError>;

    /// Cheap per-request check: signature, expiry and a live session.
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError>;
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub trusted_providers: Vec<String>,
}

pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    sessions: Arc<dyn LocalCache>,
    clock: Arc<dyn Clock>,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    bcrypt_cost: u32,
    trusted_providers: Vec<String>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn LocalCache>,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            clock,
            jwt_service: JwtService::new(&settings.jwt_secret),
            access_token_ttl_seconds: settings.access_token_ttl_seconds.max(1),
            bcrypt_cost: settings.bcrypt_cost,
            trusted_providers: settings.trusted_providers,
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        hash(password, self.bcrypt_cost)
            .map_err(|e| AuthError::Backend(format!("Failed to hash password: {}", e)))
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        verify(password, hash)
            .map_err(|e| AuthError::Backend(format!("Failed to verify password: {}", e)))
    }

    /// Mints a token and records its session so sign-out can revoke it.
    async fn issue_session(&self, user: &UserRecord) -> Result<AuthResponse, AuthError> {
        let now = self.clock.now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);
        let claims = JwtClaims {
            sub: user.id.clone(),
            sid: Uuid::new_v4().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let access_token = self
            .jwt_service
            .generate_token(&claims)
            .map_err(|e| AuthError::Backend(format!("Failed to generate token: {}", e)))?;

        self.sessions
            .set_with_ttl(
                &auth_session_key(&claims.sid),
                &user.id,
                self.access_token_ttl_seconds as u64,
            )
            .await?;

        Ok(AuthResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.access_token_ttl_seconds,
            user: UserProfile::from(user),
        })
    }

    async fn sign_in_existing(&self, mut user: UserRecord) -> Result<AuthResponse, AuthError> {
        let now = self.clock.now();
        self.users.touch_last_login(&user.id, now).await?;
        user.last_login_at = Some(now);
        self.issue_session(&user).await
    }

    async fn register(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let now = self.clock.now();
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: Some(email),
            password_hash: Some(self.hash_password(password)?),
            identity: None,
            created_at: now,
            last_login_at: Some(now),
        };
        self.users.insert(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        self.issue_session(&user).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };
        if !self.verify_password(password, password_hash)? {
            tracing::warn!(user_id = %user.id, "Failed login attempt: invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "Successful login");
        self.sign_in_existing(user).await
    }

    async fn login_with_provider(
        &self,
        provider: &str,
        subject: &str,
        email: Option<&str>,
    ) -> Result<AuthResponse, AuthError> {
        if !self.trusted_providers.iter().any(|p| p == provider) {
            return Err(AuthError::UnsupportedProvider(provider.to_string()));
        }

        if let Some(user) = self.users.find_by_identity(provider, subject).await? {
            tracing::info!(user_id = %user.id, provider, "Successful provider login");
            return self.sign_in_existing(user).await;
        }

        let email = email.map(normalize_email);
        if let Some(email) = email.as_deref() {
            if self.users.find_by_email(email).await?.is_some() {
                return Err(AuthError::EmailTaken);
            }
        }

        let now = self.clock.now();
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash: None,
            identity: Some(ProviderIdentity {
                provider: provider.to_string(),
                subject: subject.to_string(),
            }),
            created_at: now,
            last_login_at: Some(now),
        };
        self.users.insert(&user).await?;

        tracing::info!(user_id = %user.id, provider, "User registered via provider");
        self.issue_session(&user).await
    }

    async fn logout(&self, token: &str) -> Result<String, AuthError> {
        let user = self.authenticate(token).await?;
        self.sessions
            .remove(&auth_session_key(&user.session_id))
            .await?;
        tracing::info!(user_id = %user.user_id, "User signed out");
        Ok(user.user_id)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn count<T>(event: &str, result: &Result<T, AuthError>) {
    let status = if result.is_ok() { "success" } else { "failure" };
    AUTH_EVENTS_TOTAL.with_label_values(&[event, status]).inc();
}

#[async_trait]
impl IdentityProvider for AuthService {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let result = self.register(email, password).await;
        count("sign_up", &result);
        result
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let result = self.login(email, password).await;
        count("sign_in", &result);
        result
    }

    async fn sign_in_with_provider(
        &self,
        provider: &str,
        subject: &str,
        email: Option<&str>,
    ) -> Result<AuthResponse, AuthError> {
        let result = self.login_with_provider(provider, subject, email).await;
        count("provider_sign_in", &result);
        result
    }

    async fn sign_out(&self, token: &str) -> Result<String, AuthError> {
        let result = self.logout(token).await;
        count("sign_out", &result);
        result
    }

    async fn current_user(&self, token: &str) -> Result<UserProfile, AuthError> {
        let user = self.authenticate(token).await?;
        self.users
            .find_by_id(&user.user_id)
            .await?
            .map(|record| UserProfile::from(&record))
            .ok_or(AuthError::InvalidToken)
    }

    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self
            .jwt_service
            .validate_token(token, self.clock.now().timestamp())
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                AuthError::InvalidToken
            })?;

        match self.sessions.get(&auth_session_key(&claims.sid)).await {
            Ok(Some(owner)) if owner == claims.sub => Ok(AuthUser {
                user_id: claims.sub,
                session_id: claims.sid,
            }),
            Ok(_) => Err(AuthError::InvalidToken),
            // Revocation cannot be checked while the cache is down; a signed,
            // unexpired token is accepted.
            Err(e) => {
                tracing::warn!(
                    user_id = %claims.sub,
                    error = %e,
                    "Session cache unavailable, skipping revocation check"
                );
                AUTH_EVENTS_TOTAL
                    .with_label_values(&["authenticate", "degraded"])
                    .inc();
                Ok(AuthUser {
                    user_id: claims.sub,
                    session_id: claims.sid,
                })
            }
        }
    }
}
