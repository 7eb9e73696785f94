//! Persistence seams for the progress store and the identity service.
//!
//! `RemoteStore` is the authoritative per-user record, `LocalCache` a durable
//! key/value mirror used when the remote store cannot be reached, and
//! `UserDirectory` the account table. Each has a MongoDB or Redis
//! implementation and an in-memory one selected by `storage_backend`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::progress::UserProgress;
use crate::models::settings::UserSettings;
use crate::models::user::UserRecord;

pub mod memory;
pub mod mongo;
pub mod redis_cache;

pub use memory::{MemoryLocalCache, MemoryRemoteStore, MemoryUserDirectory};
pub use mongo::{MongoRemoteStore, MongoUserDirectory};
pub use redis_cache::RedisLocalCache;

/// Remote read or write failed, including per-attempt timeouts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Remote store unavailable: {reason}")]
pub struct RemoteUnavailable {
    pub reason: String,
}

impl RemoteUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Corrupt cache entry at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn load_progress(&self, user_id: &str) -> Result<Option<UserProgress>, RemoteUnavailable>;

    /// Replaces the stored record wholesale.
    async fn save_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
    ) -> Result<(), RemoteUnavailable>;

    async fn delete_progress(&self, user_id: &str) -> Result<(), RemoteUnavailable>;

    async fn load_settings(&self, user_id: &str) -> Result<Option<UserSettings>, RemoteUnavailable>;

    async fn save_settings(
        &self,
        user_id: &str,
        settings: &UserSettings,
    ) -> Result<(), RemoteUnavailable>;

    async fn ping(&self) -> Result<(), RemoteUnavailable>;
}

#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64)
        -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, RemoteUnavailable>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RemoteUnavailable>;

    async fn find_by_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<UserRecord>, RemoteUnavailable>;

    async fn insert(&self, user: &UserRecord) -> Result<(), RemoteUnavailable>;

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), RemoteUnavailable>;
}

pub fn progress_key(user_id: &str) -> String {
    format!("ikigai:{}:progress", user_id)
}

pub fn settings_key(user_id: &str) -> String {
    format!("ikigai:{}:settings", user_id)
}

pub fn auth_session_key(session_id: &str) -> String {
    format!("ikigai:auth:session:{}", session_id)
}
