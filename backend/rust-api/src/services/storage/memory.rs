//! In-memory backends for local development and tests.
//!
//! Each one can be switched off at runtime to exercise the fallback paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{CacheError, LocalCache, RemoteStore, RemoteUnavailable, UserDirectory};
use crate::models::progress::UserProgress;
use crate::models::settings::UserSettings;
use crate::models::user::UserRecord;

pub struct MemoryRemoteStore {
    progress: Mutex<HashMap<String, UserProgress>>,
    settings: Mutex<HashMap<String, UserSettings>>,
    readable: AtomicBool,
    writable: AtomicBool,
    latency: Mutex<Option<Duration>>,
    write_count: AtomicU32,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(HashMap::new()),
            settings: Mutex::new(HashMap::new()),
            readable: AtomicBool::new(true),
            writable: AtomicBool::new(true),
            latency: Mutex::new(None),
            write_count: AtomicU32::new(0),
        }
    }

    /// Turns reads and writes on or off together.
    pub fn set_available(&self, available: bool) {
        self.readable.store(available, Ordering::SeqCst);
        self.writable.store(available, Ordering::SeqCst);
    }

    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Delay applied to every call, for timeout tests.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    /// Number of accepted writes (saves and deletes).
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }

    pub async fn stored_progress(&self, user_id: &str) -> Option<UserProgress> {
        self.progress.lock().await.get(user_id).cloned()
    }

    pub async fn stored_settings(&self, user_id: &str) -> Option<UserSettings> {
        self.settings.lock().await.get(user_id).cloned()
    }

    async fn before_read(&self) -> Result<(), RemoteUnavailable> {
        self.simulate_latency().await;
        if !self.readable.load(Ordering::SeqCst) {
            return Err(RemoteUnavailable::new("memory remote store is offline"));
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<(), RemoteUnavailable> {
        self.simulate_latency().await;
        if !self.writable.load(Ordering::SeqCst) {
            return Err(RemoteUnavailable::new("memory remote store rejects writes"));
        }
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn load_progress(&self, user_id: &str) -> Result<Option<UserProgress>, RemoteUnavailable> {
        self.before_read().await?;
        Ok(self.stored_progress(user_id).await)
    }

    async fn save_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
    ) -> Result<(), RemoteUnavailable> {
        self.before_write().await?;
        self.progress
            .lock()
            .await
            .insert(user_id.to_string(), progress.clone());
        Ok(())
    }

    async fn delete_progress(&self, user_id: &str) -> Result<(), RemoteUnavailable> {
        self.before_write().await?;
        self.progress.lock().await.remove(user_id);
        Ok(())
    }

    async fn load_settings(&self, user_id: &str) -> Result<Option<UserSettings>, RemoteUnavailable> {
        self.before_read().await?;
        Ok(self.stored_settings(user_id).await)
    }

    async fn save_settings(
        &self,
        user_id: &str,
        settings: &UserSettings,
    ) -> Result<(), RemoteUnavailable> {
        self.before_write().await?;
        self.settings
            .lock()
            .await
            .insert(user_id.to_string(), settings.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), RemoteUnavailable> {
        self.before_read().await
    }
}

struct CacheSlot {
    value: String,
    expires_at: Option<Instant>,
}

pub struct MemoryLocalCache {
    entries: Mutex<HashMap<String, CacheSlot>>,
    available: AtomicBool,
}

impl MemoryLocalCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Raw value regardless of availability.
    pub async fn peek(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|slot| slot.expires_at.map_or(true, |at| at > Instant::now()))
            .map(|slot| slot.value.clone())
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Backend("memory cache is offline".to_string()))
        }
    }
}

impl Default for MemoryLocalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalCache for MemoryLocalCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.peek(key).await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.lock().await.insert(
            key.to_string(),
            CacheSlot {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheError> {
        self.check()?;
        self.entries.lock().await.insert(
            key.to_string(),
            CacheSlot {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check()
    }
}

pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
    available: AtomicBool,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RemoteUnavailable> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteUnavailable::new("memory user directory is offline"))
        }
    }
}

impl Default for MemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, RemoteUnavailable> {
        self.check()?;
        Ok(self.users.lock().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RemoteUnavailable> {
        self.check()?;
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<UserRecord>, RemoteUnavailable> {
        self.check()?;
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|user| {
                user.identity
                    .as_ref()
                    .is_some_and(|i| i.provider == provider && i.subject == subject)
            })
            .cloned())
    }

    async fn insert(&self, user: &UserRecord) -> Result<(), RemoteUnavailable> {
        self.check()?;
        self.users.lock().await.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), RemoteUnavailable> {
        self.check()?;
        if let Some(user) = self.users.lock().await.get_mut(id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remote_store_toggles_fail_calls() {
        let store = MemoryRemoteStore::new();
        store
            .save_progress("u1", &UserProgress::default())
            .await
            .unwrap();
        assert_eq!(store.write_count(), 1);

        store.set_writable(false);
        assert!(store.save_progress("u1", &UserProgress::default()).await.is_err());
        assert!(store.load_progress("u1").await.unwrap().is_some());

        store.set_available(false);
        assert!(store.load_progress("u1").await.is_err());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let cache = MemoryLocalCache::new();
        cache.set_with_ttl("k", "v", 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.set_available(false);
        assert!(cache.get("k").await.is_err());
        assert_eq!(cache.peek("k").await.as_deref(), Some("v"));
    }
}
