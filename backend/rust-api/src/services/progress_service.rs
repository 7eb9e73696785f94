use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ProgressError, ValidationError};
use crate::metrics::{record_fallback, BADGES_EARNED_TOTAL, COMPLETIONS_TOTAL, RECONCILIATIONS_TOTAL};
use crate::models::content::{ModuleResponses, ResponseCheck};
use crate::models::progress::UserProgress;
use crate::models::settings::UserSettings;
use crate::services::content_service::Catalog;
use crate::services::storage::{
    progress_key, settings_key, CacheError, LocalCache, RemoteStore, RemoteUnavailable,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::Clock;

/// Whether the local copy of a record has reached the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    Pending,
    /// A reset the remote store has not applied yet. Replayed as a full
    /// replace, never merged.
    ResetPending,
}

/// Where a mutation was durably recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Remote,
    LocalOnly,
    MemoryOnly,
}

impl WriteOutcome {
    /// Non-fatal message for the client, if any.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            WriteOutcome::Remote => None,
            WriteOutcome::LocalOnly => {
                Some("Saved on this device only; it will sync once the server is reachable")
            }
            WriteOutcome::MemoryOnly => {
                Some("Could not save; changes last only until this session ends")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Persisted<T> {
    pub value: T,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub newly_completed: bool,
    pub progress: UserProgress,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedProgress {
    progress: UserProgress,
    sync: SyncState,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedSettings {
    settings: UserSettings,
    sync: SyncState,
}

/// Shared collaborators every per-user store is built from.
#[derive(Clone)]
pub struct StoreContext {
    pub catalog: Arc<Catalog>,
    pub remote: Arc<dyn RemoteStore>,
    pub cache: Arc<dyn LocalCache>,
    pub clock: Arc<dyn Clock>,
    pub retry: RetryConfig,
    pub remote_timeout: Duration,
}

/// Single writer of one user's progress and settings.
///
/// Every mutation is applied in memory, written to the local cache as
/// pending, then pushed to the remote store. A failed push leaves the
/// pending entry behind; the next load merges it into the remote record.
pub struct ProgressStore {
    user_id: String,
    ctx: StoreContext,
    progress: UserProgress,
    progress_sync: SyncState,
    progress_loaded: bool,
    settings: UserSettings,
    settings_sync: SyncState,
    settings_loaded: bool,
}

impl ProgressStore {
    pub fn new(user_id: impl Into<String>, ctx: StoreContext) -> Self {
        Self {
            user_id: user_id.into(),
            ctx,
            progress: UserProgress::default(),
            progress_sync: SyncState::Synced,
            progress_loaded: false,
            settings: UserSettings::default(),
            settings_sync: SyncState::Synced,
            settings_loaded: false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.ctx.catalog
    }

    pub fn sync_state(&self) -> SyncState {
        self.progress_sync
    }

    /// Best available progress. Never fails: remote, then local cache, then
    /// the in-memory copy or a zero-value record.
    pub async fn get_progress(&mut self) -> UserProgress {
        self.load_progress().await;

        let today = self.ctx.clock.today();
        if self.progress.apply_session_start(today) {
            tracing::debug!(
                user_id = %self.user_id,
                streak = self.progress.streak(),
                "Streak updated on session start"
            );
            self.persist_progress("session_start").await;
        }

        self.progress.clone()
    }

    pub async fn complete_module(
        &mut self,
        module_id: &str,
        island_id: &str,
        responses: ModuleResponses,
    ) -> Result<Persisted<Completion>, ProgressError> {
        let catalog = Arc::clone(&self.ctx.catalog);
        let island = catalog
            .island(island_id)
            .ok_or_else(|| ProgressError::not_found("island", island_id))?;
        let module = catalog
            .module(module_id)
            .ok_or_else(|| ProgressError::not_found("module", module_id))?;
        if module.island_id != island.id {
            return Err(ValidationError::new(
                "island_id",
                format!("module {} does not belong to island {}", module.id, island.id),
            )
            .into());
        }
        module.validate_responses(&responses, ResponseCheck::Complete)?;

        self.ensure_current().await;

        let badges_before: BTreeSet<String> = self.progress.badges().keys().cloned().collect();
        let now = self.ctx.clock.now();
        let newly_completed = self
            .progress
            .record_module_completion(&catalog, module, responses, now);

        if newly_completed {
            COMPLETIONS_TOTAL.with_label_values(&["module"]).inc();
            for (badge_id, badge) in self.progress.badges() {
                if !badges_before.contains(badge_id) {
                    BADGES_EARNED_TOTAL
                        .with_label_values(&[badge.tier.as_str()])
                        .inc();
                    tracing::info!(user_id = %self.user_id, badge = %badge_id, "Badge earned");
                }
            }
        }
        tracing::info!(
            user_id = %self.user_id,
            module_id,
            newly_completed,
            total_points = self.progress.total_points(),
            "Module completed"
        );

        let outcome = self.persist_progress("complete_module").await;
        Ok(Persisted {
            value: Completion {
                newly_completed,
                progress: self.progress.clone(),
            },
            outcome,
        })
    }

    pub async fn complete_challenge(
        &mut self,
        challenge_id: &str,
    ) -> Result<Persisted<Completion>, ProgressError> {
        let catalog = Arc::clone(&self.ctx.catalog);
        let challenge = catalog
            .challenge(challenge_id)
            .ok_or_else(|| ProgressError::not_found("challenge", challenge_id))?;

        self.ensure_current().await;
        let newly_completed = self.progress.record_challenge(challenge, self.ctx.clock.now());
        if newly_completed {
            COMPLETIONS_TOTAL.with_label_values(&["challenge"]).inc();
        }
        tracing::info!(
            user_id = %self.user_id,
            challenge_id,
            newly_completed,
            "Challenge completed"
        );

        let outcome = self.persist_progress("complete_challenge").await;
        Ok(Persisted {
            value: Completion {
                newly_completed,
                progress: self.progress.clone(),
            },
            outcome,
        })
    }

    pub async fn complete_exercise(
        &mut self,
        exercise_id: &str,
    ) -> Result<Persisted<Completion>, ProgressError> {
        let catalog = Arc::clone(&self.ctx.catalog);
        let exercise = catalog
            .exercise(exercise_id)
            .ok_or_else(|| ProgressError::not_found("exercise", exercise_id))?;

        self.ensure_current().await;
        let newly_completed = self.progress.record_exercise(exercise, self.ctx.clock.now());
        if newly_completed {
            COMPLETIONS_TOTAL.with_label_values(&["exercise"]).inc();
        }
        tracing::info!(
            user_id = %self.user_id,
            exercise_id,
            newly_completed,
            "Exercise completed"
        );

        let outcome = self.persist_progress("complete_exercise").await;
        Ok(Persisted {
            value: Completion {
                newly_completed,
                progress: self.progress.clone(),
            },
            outcome,
        })
    }

    /// Draft save. Answer shapes are checked, required questions are not.
    pub async fn save_module_responses(
        &mut self,
        module_id: &str,
        responses: ModuleResponses,
    ) -> Result<Persisted<UserProgress>, ProgressError> {
        let catalog = Arc::clone(&self.ctx.catalog);
        let module = catalog
            .module(module_id)
            .ok_or_else(|| ProgressError::not_found("module", module_id))?;
        module.validate_responses(&responses, ResponseCheck::Draft)?;

        self.ensure_current().await;
        self.progress
            .save_responses(module_id, responses, self.ctx.clock.now());

        let outcome = self.persist_progress("save_module_responses").await;
        Ok(Persisted {
            value: self.progress.clone(),
            outcome,
        })
    }

    /// Clears progress everywhere. Settings are kept.
    pub async fn reset_all_data(&mut self) -> Persisted<UserProgress> {
        self.progress = UserProgress::default();
        self.progress_loaded = true;
        self.progress_sync = SyncState::ResetPending;

        let key = progress_key(&self.user_id);
        let cached = self
            .write_cache(
                &key,
                &CachedProgress {
                    progress: self.progress.clone(),
                    sync: SyncState::ResetPending,
                },
            )
            .await;

        let ctx = &self.ctx;
        let user_id = self.user_id.as_str();
        let deleted = retry_async_with_config("delete_progress", &ctx.retry, || {
            bounded(ctx.remote_timeout, ctx.remote.delete_progress(user_id))
        })
        .await;

        let outcome = self.settle_progress_write("reset_all_data", deleted, cached).await;
        tracing::info!(user_id = %self.user_id, ?outcome, "Progress reset");
        Persisted {
            value: self.progress.clone(),
            outcome,
        }
    }

    pub async fn get_user_settings(&mut self) -> UserSettings {
        self.load_settings().await;
        self.settings.clone()
    }

    /// Validates the raw body before anything changes. A rejected body
    /// leaves memory, cache and remote untouched.
    pub async fn save_user_settings(
        &mut self,
        body: serde_json::Value,
    ) -> Result<Persisted<UserSettings>, ProgressError> {
        let settings = UserSettings::from_value(body)?;

        self.settings = settings;
        self.settings_loaded = true;
        self.settings_sync = SyncState::Pending;

        let outcome = self.persist_settings("save_user_settings").await;
        Ok(Persisted {
            value: self.settings.clone(),
            outcome,
        })
    }

    /// Loads before a mutation, or retries a pending sync.
    async fn ensure_current(&mut self) {
        if !self.progress_loaded || self.progress_sync != SyncState::Synced {
            self.load_progress().await;
        }
    }

    async fn load_progress(&mut self) {
        let local = if self.progress_loaded {
            Some(CachedProgress {
                progress: self.progress.clone(),
                sync: self.progress_sync,
            })
        } else {
            self.read_cache::<CachedProgress>(&progress_key(&self.user_id))
                .await
        };

        let ctx = &self.ctx;
        let fetched = bounded(ctx.remote_timeout, ctx.remote.load_progress(&self.user_id)).await;

        match (fetched, local) {
            (Ok(remote), Some(entry)) if entry.sync == SyncState::Pending => {
                let remote = remote.unwrap_or_default();
                self.progress = UserProgress::merge(&remote, &entry.progress, &self.ctx.catalog);
                self.progress_sync = SyncState::Pending;
                self.replay_progress("merge").await;
            }
            (Ok(_), Some(entry)) if entry.sync == SyncState::ResetPending => {
                self.progress = entry.progress;
                self.progress_sync = SyncState::ResetPending;
                self.replay_progress("reset").await;
            }
            (Ok(remote), _) => {
                self.progress = remote.unwrap_or_default();
                self.progress_sync = SyncState::Synced;
                self.mirror_progress().await;
            }
            (Err(e), local) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    error = %e,
                    "Remote progress unavailable, using local copy"
                );
                match local {
                    Some(entry) => {
                        record_fallback("load_progress", "local");
                        self.progress = entry.progress;
                        // Never confirmed against the remote record.
                        self.progress_sync = match entry.sync {
                            SyncState::ResetPending => SyncState::ResetPending,
                            _ => SyncState::Pending,
                        };
                    }
                    None => {
                        record_fallback("load_progress", "zero_value");
                        self.progress = UserProgress::default();
                        self.progress_sync = SyncState::Pending;
                    }
                }
            }
        }

        self.progress.recompute_derived(&self.ctx.catalog);
        self.progress_loaded = true;
    }

    /// Pushes a merged or reset record found during a load.
    async fn replay_progress(&mut self, kind: &str) {
        match self.push_progress().await {
            Ok(()) => {
                RECONCILIATIONS_TOTAL
                    .with_label_values(&[kind, "success"])
                    .inc();
                tracing::info!(user_id = %self.user_id, kind, "Pending progress reconciled");
                self.progress_sync = SyncState::Synced;
                self.mirror_progress().await;
            }
            Err(e) => {
                RECONCILIATIONS_TOTAL
                    .with_label_values(&[kind, "error"])
                    .inc();
                tracing::warn!(user_id = %self.user_id, kind, error = %e, "Reconciliation failed");
                let entry = CachedProgress {
                    progress: self.progress.clone(),
                    sync: self.progress_sync,
                };
                let _ = self.write_cache(&progress_key(&self.user_id), &entry).await;
            }
        }
    }

    async fn persist_progress(&mut self, operation: &str) -> WriteOutcome {
        let prior = self.progress_sync;
        let pending = match prior {
            SyncState::ResetPending => SyncState::ResetPending,
            _ => SyncState::Pending,
        };
        self.progress_sync = pending;

        let cached = self
            .write_cache(
                &progress_key(&self.user_id),
                &CachedProgress {
                    progress: self.progress.clone(),
                    sync: pending,
                },
            )
            .await;

        // An unreconciled record is merged rather than written over the
        // remote one; a pending reset is a plain replace.
        let pushed = match prior {
            SyncState::Pending => self.merge_and_push().await,
            SyncState::Synced | SyncState::ResetPending => self.push_progress().await,
        };

        self.settle_progress_write(operation, pushed, cached).await
    }

    async fn settle_progress_write(
        &mut self,
        operation: &str,
        pushed: Result<(), RemoteUnavailable>,
        cached: Result<(), CacheError>,
    ) -> WriteOutcome {
        match pushed {
            Ok(()) => {
                self.progress_sync = SyncState::Synced;
                self.mirror_progress().await;
                WriteOutcome::Remote
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    operation,
                    error = %e,
                    "Remote write failed, keeping local copy"
                );
                fallback_outcome(operation, cached.is_ok())
            }
        }
    }

    async fn merge_and_push(&mut self) -> Result<(), RemoteUnavailable> {
        let ctx = &self.ctx;
        let remote = bounded(ctx.remote_timeout, ctx.remote.load_progress(&self.user_id)).await?;
        self.progress =
            UserProgress::merge(&remote.unwrap_or_default(), &self.progress, &self.ctx.catalog);
        self.push_progress().await
    }

    async fn push_progress(&self) -> Result<(), RemoteUnavailable> {
        let ctx = &self.ctx;
        let user_id = self.user_id.as_str();
        let progress = &self.progress;
        retry_async_with_config("save_progress", &ctx.retry, || {
            bounded(ctx.remote_timeout, ctx.remote.save_progress(user_id, progress))
        })
        .await
    }

    async fn mirror_progress(&self) {
        let entry = CachedProgress {
            progress: self.progress.clone(),
            sync: SyncState::Synced,
        };
        let _ = self.write_cache(&progress_key(&self.user_id), &entry).await;
    }

    async fn load_settings(&mut self) {
        let local = if self.settings_loaded {
            Some(CachedSettings {
                settings: self.settings.clone(),
                sync: self.settings_sync,
            })
        } else {
            self.read_cache::<CachedSettings>(&settings_key(&self.user_id))
                .await
        };

        // Settings are stored verbatim, so a pending local copy simply wins.
        if let Some(entry) = local.as_ref().filter(|e| e.sync != SyncState::Synced) {
            self.settings = entry.settings.clone();
            self.settings_sync = SyncState::Pending;
            self.settings_loaded = true;
            match self.push_settings().await {
                Ok(()) => {
                    RECONCILIATIONS_TOTAL
                        .with_label_values(&["settings", "success"])
                        .inc();
                    self.settings_sync = SyncState::Synced;
                    self.mirror_settings().await;
                }
                Err(e) => {
                    RECONCILIATIONS_TOTAL
                        .with_label_values(&["settings", "error"])
                        .inc();
                    tracing::warn!(user_id = %self.user_id, error = %e, "Settings sync failed");
                }
            }
            return;
        }

        let ctx = &self.ctx;
        match bounded(ctx.remote_timeout, ctx.remote.load_settings(&self.user_id)).await {
            Ok(remote) => {
                self.settings = remote.unwrap_or_default();
                self.settings_sync = SyncState::Synced;
                self.mirror_settings().await;
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    error = %e,
                    "Remote settings unavailable, using local copy"
                );
                record_fallback("load_settings", if local.is_some() { "local" } else { "defaults" });
                self.settings = local.map(|entry| entry.settings).unwrap_or_default();
            }
        }
        self.settings_loaded = true;
    }

    async fn persist_settings(&mut self, operation: &str) -> WriteOutcome {
        let cached = self
            .write_cache(
                &settings_key(&self.user_id),
                &CachedSettings {
                    settings: self.settings.clone(),
                    sync: SyncState::Pending,
                },
            )
            .await;

        match self.push_settings().await {
            Ok(()) => {
                self.settings_sync = SyncState::Synced;
                self.mirror_settings().await;
                WriteOutcome::Remote
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    operation,
                    error = %e,
                    "Remote write failed, keeping local copy"
                );
                fallback_outcome(operation, cached.is_ok())
            }
        }
    }

    async fn push_settings(&self) -> Result<(), RemoteUnavailable> {
        let ctx = &self.ctx;
        let user_id = self.user_id.as_str();
        let settings = &self.settings;
        retry_async_with_config("save_settings", &ctx.retry, || {
            bounded(ctx.remote_timeout, ctx.remote.save_settings(user_id, settings))
        })
        .await
    }

    async fn mirror_settings(&self) {
        let entry = CachedSettings {
            settings: self.settings.clone(),
            sync: SyncState::Synced,
        };
        let _ = self.write_cache(&settings_key(&self.user_id), &entry).await;
    }

    async fn read_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.ctx.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::error!(key, error = %e, "Discarding corrupt cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::error!(key, error = %e, "Local cache read failed");
                None
            }
        }
    }

    async fn write_cache<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.ctx.cache.set(key, &raw).await.map_err(|e| {
            tracing::error!(key, error = %e, "Local cache write failed");
            e
        })
    }
}

fn fallback_outcome(operation: &str, cached: bool) -> WriteOutcome {
    if cached {
        record_fallback(operation, "local_only");
        WriteOutcome::LocalOnly
    } else {
        record_fallback(operation, "memory_only");
        WriteOutcome::MemoryOnly
    }
}

/// One remote attempt bounded by `limit`.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, RemoteUnavailable>
where
    F: Future<Output = Result<T, RemoteUnavailable>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(RemoteUnavailable::new(format!(
            "timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::Answer;
    use crate::services::catalog_seed::builtin_catalog;
    use crate::services::storage::{MemoryLocalCache, MemoryRemoteStore};
    use crate::utils::time::FixedClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    struct Harness {
        remote: Arc<MemoryRemoteStore>,
        cache: Arc<MemoryLocalCache>,
        clock: Arc<FixedClock>,
        ctx: StoreContext,
    }

    impl Harness {
        fn new() -> Self {
            let remote = Arc::new(MemoryRemoteStore::new());
            let cache = Arc::new(MemoryLocalCache::new());
            let clock = Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
            ));
            let ctx = StoreContext {
                catalog: Arc::new(builtin_catalog().unwrap()),
                remote: remote.clone(),
                cache: cache.clone(),
                clock: clock.clone(),
                retry: RetryConfig {
                    max_attempts: 2,
                    base_backoff: Duration::from_millis(1),
                    max_backoff: Duration::from_millis(2),
                    jitter_max: None,
                },
                remote_timeout: Duration::from_millis(100),
            };
            Self {
                remote,
                cache,
                clock,
                ctx,
            }
        }

        fn store(&self) -> ProgressStore {
            ProgressStore::new("user-1", self.ctx.clone())
        }

        async fn cached_progress(&self) -> CachedProgress {
            let raw = self.cache.peek(&progress_key("user-1")).await.unwrap();
            serde_json::from_str(&raw).unwrap()
        }
    }

    fn breath_answers() -> ModuleResponses {
        let mut responses = ModuleResponses::new();
        responses.insert("calm_before".to_string(), Answer::Number(6));
        responses.insert(
            "breath_location".to_string(),
            Answer::Text("belly".to_string()),
        );
        responses
    }

    fn settings_body() -> serde_json::Value {
        json!({
            "notifications": false,
            "sounds": false,
            "dark_mode": true,
            "daily_reminders": true,
            "meditation_sounds": false,
            "data_privacy": "public",
            "language": "de"
        })
    }

    #[tokio::test]
    async fn new_user_gets_zero_value_record() {
        let harness = Harness::new();
        let mut store = harness.store();
        assert_eq!(store.get_progress().await, UserProgress::default());
        assert_eq!(store.sync_state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn challenge_completion_survives_failed_remote_write() {
        let harness = Harness::new();
        harness.remote.set_writable(false);
        let mut store = harness.store();
        let points = harness.ctx.catalog.challenge("gratitude_practice").unwrap().points;

        let result = store.complete_challenge("gratitude_practice").await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::LocalOnly);
        assert!(result.outcome.notice().is_some());
        assert!(result.value.newly_completed);

        let cached = harness.cached_progress().await;
        assert_eq!(cached.sync, SyncState::Pending);
        assert!(cached.progress.is_challenge_completed("gratitude_practice"));
        assert_eq!(cached.progress.total_points(), points);

        // Repeating the action while still offline must not add points again.
        let again = store.complete_challenge("gratitude_practice").await.unwrap();
        assert!(!again.value.newly_completed);
        assert_eq!(harness.cached_progress().await.progress.total_points(), points);
    }

    #[tokio::test]
    async fn pending_write_is_reconciled_once_remote_returns() {
        let harness = Harness::new();
        let mut store = harness.store();
        store.complete_challenge("digital_detox").await.unwrap();

        harness.remote.set_writable(false);
        store.complete_challenge("gratitude_practice").await.unwrap();
        assert_eq!(store.sync_state(), SyncState::Pending);

        harness.remote.set_writable(true);
        let progress = store.get_progress().await;
        assert_eq!(store.sync_state(), SyncState::Synced);

        let remote = harness.remote.stored_progress("user-1").await.unwrap();
        assert_eq!(remote, progress);
        assert!(remote.is_challenge_completed("gratitude_practice"));
        assert!(remote.is_challenge_completed("digital_detox"));
        let catalog = &harness.ctx.catalog;
        assert_eq!(
            remote.total_points(),
            catalog.challenge("gratitude_practice").unwrap().points
                + catalog.challenge("digital_detox").unwrap().points
        );
        assert_eq!(harness.cached_progress().await.sync, SyncState::Synced);
    }

    #[tokio::test]
    async fn pending_cache_entry_is_merged_after_restart() {
        let harness = Harness::new();
        {
            let mut store = harness.store();
            store.complete_challenge("digital_detox").await.unwrap();
        }

        harness.remote.set_writable(false);
        {
            let mut store = harness.store();
            store.complete_module("breath_awareness", "mindful_island", breath_answers())
                .await
                .unwrap();
        }

        harness.remote.set_writable(true);
        let mut store = harness.store();
        let progress = store.get_progress().await;
        assert!(progress.is_module_completed("breath_awareness"));
        assert!(progress.is_challenge_completed("digital_detox"));
        assert!(progress.island_progress().contains_key("mindful_island"));

        // Merging the same pending entry again changes nothing.
        let mut other = harness.store();
        assert_eq!(other.get_progress().await, progress);
    }

    #[tokio::test]
    async fn module_completion_is_idempotent() {
        let harness = Harness::new();
        let mut store = harness.store();
        let module = harness.ctx.catalog.module("breath_awareness").unwrap();

        let first = store
            .complete_module("breath_awareness", "mindful_island", breath_answers())
            .await
            .unwrap();
        assert_eq!(first.outcome, WriteOutcome::Remote);
        let mut updated = breath_answers();
        updated.insert("calm_before".to_string(), Answer::Number(9));
        let second = store
            .complete_module("breath_awareness", "mindful_island", updated.clone())
            .await
            .unwrap();

        assert!(first.value.newly_completed);
        assert!(!second.value.newly_completed);
        let progress = second.value.progress;
        assert_eq!(progress.total_points(), module.points);
        assert_eq!(progress.badges(), first.value.progress.badges());
        assert_eq!(progress.module_responses()["breath_awareness"], updated);
    }

    #[tokio::test]
    async fn completion_is_validated_before_anything_changes() {
        let harness = Harness::new();
        let mut store = harness.store();

        let unknown = store.complete_challenge("no_such_challenge").await;
        assert!(matches!(unknown, Err(ProgressError::NotFound { .. })));

        let wrong_island = store
            .complete_module("breath_awareness", "calm_island", breath_answers())
            .await;
        assert!(matches!(wrong_island, Err(ProgressError::Validation(_))));

        let missing_required = store
            .complete_module("breath_awareness", "mindful_island", ModuleResponses::new())
            .await;
        assert!(matches!(missing_required, Err(ProgressError::Validation(_))));

        assert_eq!(harness.remote.write_count(), 0);
        assert!(harness.cache.peek(&progress_key("user-1")).await.is_none());
    }

    #[tokio::test]
    async fn draft_responses_skip_required_check() {
        let harness = Harness::new();
        let mut store = harness.store();
        let mut draft = ModuleResponses::new();
        draft.insert("observation".to_string(), Answer::Text("calm".to_string()));

        let saved = store
            .save_module_responses("breath_awareness", draft.clone())
            .await
            .unwrap();
        assert_eq!(saved.value.module_responses()["breath_awareness"], draft);
        assert!(!saved.value.is_module_completed("breath_awareness"));

        let mut bad = ModuleResponses::new();
        bad.insert("calm_before".to_string(), Answer::Number(42));
        assert!(store
            .save_module_responses("breath_awareness", bad)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn streak_advances_across_days() {
        let harness = Harness::new();
        let mut store = harness.store();
        store.complete_challenge("digital_detox").await.unwrap();
        assert_eq!(store.get_progress().await.streak(), 1);

        harness.clock.advance_days(1);
        let progress = store.get_progress().await;
        assert_eq!(progress.streak(), 2);
        assert_eq!(
            progress.last_active_date(),
            Some(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
        );
        assert_eq!(store.get_progress().await.streak(), 2);

        harness.clock.advance_days(3);
        assert_eq!(store.get_progress().await.streak(), 1);
    }

    #[tokio::test]
    async fn slow_remote_falls_back_to_cache() {
        let harness = Harness::new();
        let mut store = harness.store();
        store.complete_challenge("digital_detox").await.unwrap();

        harness
            .remote
            .set_latency(Some(Duration::from_millis(500)))
            .await;
        let mut fresh = harness.store();
        let progress = fresh.get_progress().await;
        assert!(progress.is_challenge_completed("digital_detox"));
        assert_eq!(fresh.sync_state(), SyncState::Pending);
    }

    #[tokio::test]
    async fn memory_only_when_cache_and_remote_fail() {
        let harness = Harness::new();
        harness.remote.set_available(false);
        harness.cache.set_available(false);
        let mut store = harness.store();

        assert_eq!(store.get_progress().await, UserProgress::default());
        let result = store.complete_exercise("box_breathing").await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::MemoryOnly);
        assert!(store
            .get_progress()
            .await
            .completed_exercises()
            .contains("box_breathing"));
    }

    #[tokio::test]
    async fn reset_clears_everywhere() {
        let harness = Harness::new();
        let mut store = harness.store();
        store.complete_challenge("digital_detox").await.unwrap();

        let reset = store.reset_all_data().await;
        assert_eq!(reset.outcome, WriteOutcome::Remote);
        assert_eq!(reset.value, UserProgress::default());
        assert!(harness.remote.stored_progress("user-1").await.is_none());
        assert_eq!(harness.cached_progress().await.progress, UserProgress::default());
        assert_eq!(store.get_progress().await, UserProgress::default());
    }

    #[tokio::test]
    async fn failed_reset_is_replayed_as_full_replace() {
        let harness = Harness::new();
        let mut store = harness.store();
        store.complete_challenge("digital_detox").await.unwrap();
        store.complete_challenge("gratitude_practice").await.unwrap();

        harness.remote.set_writable(false);
        let reset = store.reset_all_data().await;
        assert_eq!(reset.outcome, WriteOutcome::LocalOnly);
        assert_eq!(harness.cached_progress().await.sync, SyncState::ResetPending);

        harness.remote.set_writable(true);
        let mut restarted = harness.store();
        let progress = restarted.get_progress().await;
        assert_eq!(progress, UserProgress::default());
        assert_eq!(
            harness.remote.stored_progress("user-1").await,
            Some(UserProgress::default())
        );
        assert_eq!(restarted.sync_state(), SyncState::Synced);
    }

    #[tokio::test]
    async fn settings_default_then_round_trip() {
        let harness = Harness::new();
        let mut store = harness.store();
        assert_eq!(store.get_user_settings().await, UserSettings::default());

        let saved = store.save_user_settings(settings_body()).await.unwrap();
        assert_eq!(saved.outcome, WriteOutcome::Remote);
        assert!(saved.value.dark_mode);

        let mut fresh = harness.store();
        assert_eq!(fresh.get_user_settings().await, saved.value);
    }

    #[tokio::test]
    async fn invalid_settings_change_nothing() {
        let harness = Harness::new();
        let mut store = harness.store();
        store.save_user_settings(settings_body()).await.unwrap();
        let writes = harness.remote.write_count();

        let mut body = settings_body();
        body["dark_mode"] = json!("sometimes");
        body["sounds"] = json!(true);
        let result = store.save_user_settings(body).await;
        assert!(matches!(result, Err(ProgressError::Validation(_))));

        assert_eq!(harness.remote.write_count(), writes);
        let stored = harness.remote.stored_settings("user-1").await.unwrap();
        assert!(!stored.sounds);
        assert!(!store.get_user_settings().await.sounds);
    }

    #[tokio::test]
    async fn offline_settings_sync_later() {
        let harness = Harness::new();
        harness.remote.set_writable(false);
        let mut store = harness.store();
        let saved = store.save_user_settings(settings_body()).await.unwrap();
        assert_eq!(saved.outcome, WriteOutcome::LocalOnly);

        harness.remote.set_writable(true);
        let mut fresh = harness.store();
        assert_eq!(fresh.get_user_settings().await, saved.value);
        assert_eq!(
            harness.remote.stored_settings("user-1").await,
            Some(saved.value)
        );
    }
}
