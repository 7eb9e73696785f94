use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::metrics::SESSIONS_ACTIVE;
use crate::services::progress_service::{ProgressStore, StoreContext};

/// A user's store behind the lock that orders their mutations.
pub type SharedStore = Arc<Mutex<ProgressStore>>;

struct Entry {
    store: SharedStore,
    last_access: DateTime<Utc>,
}

/// Open progress stores keyed by user id.
///
/// Sessions that end by token expiry never call [`SessionRegistry::close`],
/// so stores idle for longer than `idle_timeout` are dropped on the next
/// `open`. A store still held by a request is never dropped.
pub struct SessionRegistry {
    ctx: StoreContext,
    idle_timeout: Duration,
    stores: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new(ctx: StoreContext, idle_timeout: Duration) -> Self {
        Self {
            ctx,
            idle_timeout,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &StoreContext {
        &self.ctx
    }

    /// Returns the user's open store, creating it if needed.
    pub async fn open(&self, user_id: &str) -> SharedStore {
        let now = self.ctx.clock.now();
        let mut stores = self.stores.write().await;

        let entry = stores.entry(user_id.to_string()).or_insert_with(|| {
            tracing::debug!(user_id, "Opening progress store");
            Entry {
                store: Arc::new(Mutex::new(ProgressStore::new(user_id, self.ctx.clone()))),
                last_access: now,
            }
        });
        entry.last_access = now;
        let store = Arc::clone(&entry.store);

        let before = stores.len();
        stores.retain(|id, entry| {
            id == user_id
                || now - entry.last_access <= self.idle_timeout
                || Arc::strong_count(&entry.store) > 1
        });
        if stores.len() < before {
            tracing::debug!(evicted = before - stores.len(), "Dropped idle progress stores");
        }

        SESSIONS_ACTIVE.set(stores.len() as i64);
        store
    }

    pub async fn get(&self, user_id: &str) -> Option<SharedStore> {
        self.stores
            .read()
            .await
            .get(user_id)
            .map(|entry| Arc::clone(&entry.store))
    }

    /// Drops the user's store. Returns whether one was open.
    pub async fn close(&self, user_id: &str) -> bool {
        let mut stores = self.stores.write().await;
        let closed = stores.remove(user_id).is_some();
        SESSIONS_ACTIVE.set(stores.len() as i64);
        if closed {
            tracing::debug!(user_id, "Closed progress store");
        }
        closed
    }

    pub async fn active_count(&self) -> usize {
        self.stores.read().await.len()
    }
}
