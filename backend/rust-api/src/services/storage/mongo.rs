use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{RemoteStore, RemoteUnavailable, UserDirectory};
use crate::metrics::track_remote_operation;
use crate::models::progress::UserProgress;
use crate::models::settings::UserSettings;
use crate::models::user::{bson_datetime_as_chrono, UserRecord};
use crate::utils::time::{chrono_to_bson, Clock};

const PROGRESS_COLLECTION: &str = "user_progress";
const SETTINGS_COLLECTION: &str = "user_settings";
const USERS_COLLECTION: &str = "users";

#[derive(Debug, Serialize, Deserialize)]
struct ProgressDocument {
    #[serde(rename = "_id")]
    user_id: String,
    progress: UserProgress,
    #[serde(rename = "savedAt", with = "bson_datetime_as_chrono")]
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsDocument {
    #[serde(rename = "_id")]
    user_id: String,
    settings: UserSettings,
    #[serde(rename = "savedAt", with = "bson_datetime_as_chrono")]
    saved_at: DateTime<Utc>,
}

fn unavailable(context: &str, e: mongodb::error::Error) -> RemoteUnavailable {
    RemoteUnavailable::new(format!("{}: {}", context, e))
}

/// Progress and settings documents keyed by user id.
#[derive(Clone)]
pub struct MongoRemoteStore {
    mongo: Database,
    clock: Arc<dyn Clock>,
}

impl MongoRemoteStore {
    pub fn new(mongo: Database, clock: Arc<dyn Clock>) -> Self {
        Self { mongo, clock }
    }

    fn progress_document(&self, user_id: &str, progress: &UserProgress) -> ProgressDocument {
        ProgressDocument {
            user_id: user_id.to_string(),
            progress: progress.clone(),
            saved_at: self.clock.now(),
        }
    }

    fn settings_document(&self, user_id: &str, settings: &UserSettings) -> SettingsDocument {
        SettingsDocument {
            user_id: user_id.to_string(),
            settings: settings.clone(),
            saved_at: self.clock.now(),
        }
    }

    fn progress(&self) -> Collection<ProgressDocument> {
        self.mongo.collection(PROGRESS_COLLECTION)
    }

    fn settings(&self) -> Collection<SettingsDocument> {
        self.mongo.collection(SETTINGS_COLLECTION)
    }
}

#[async_trait]
impl RemoteStore for MongoRemoteStore {
    async fn load_progress(&self, user_id: &str) -> Result<Option<UserProgress>, RemoteUnavailable> {
        track_remote_operation("load_progress", async {
            self.progress()
                .find_one(doc! { "_id": user_id })
                .await
                .map(|found| found.map(|document| document.progress))
                .map_err(|e| unavailable("Failed to load progress", e))
        })
        .await
    }

    async fn save_progress(
        &self,
        user_id: &str,
        progress: &UserProgress,
    ) -> Result<(), RemoteUnavailable> {
        let document = self.progress_document(user_id, progress);
        track_remote_operation("save_progress", async {
            self.progress()
                .replace_one(doc! { "_id": user_id }, &document)
                .upsert(true)
                .await
                .map(|_| ())
                .map_err(|e| unavailable("Failed to save progress", e))
        })
        .await
    }

    async fn delete_progress(&self, user_id: &str) -> Result<(), RemoteUnavailable> {
        track_remote_operation("delete_progress", async {
            self.progress()
                .delete_one(doc! { "_id": user_id })
                .await
                .map(|_| ())
                .map_err(|e| unavailable("Failed to delete progress", e))
        })
        .await
    }

    async fn load_settings(&self, user_id: &str) -> Result<Option<UserSettings>, RemoteUnavailable> {
        track_remote_operation("load_settings", async {
            self.settings()
                .find_one(doc! { "_id": user_id })
                .await
                .map(|found| found.map(|document| document.settings))
                .map_err(|e| unavailable("Failed to load settings", e))
        })
        .await
    }

    async fn save_settings(
        &self,
        user_id: &str,
        settings: &UserSettings,
    ) -> Result<(), RemoteUnavailable> {
        let document = self.settings_document(user_id, settings);
        track_remote_operation("save_settings", async {
            self.settings()
                .replace_one(doc! { "_id": user_id }, &document)
                .upsert(true)
                .await
                .map(|_| ())
                .map_err(|e| unavailable("Failed to save settings", e))
        })
        .await
    }

    async fn ping(&self) -> Result<(), RemoteUnavailable> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| unavailable("MongoDB ping failed", e))
    }
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    mongo: Database,
}

impl MongoUserDirectory {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn users(&self) -> Collection<UserRecord> {
        self.mongo.collection(USERS_COLLECTION)
    }

    /// Unique email and provider identity. Sparse so provider-only and
    /// password-only accounts can coexist.
    pub async fn ensure_indexes(&self) -> Result<(), RemoteUnavailable> {
        let unique_sparse = || IndexOptions::builder().unique(true).sparse(true).build();
        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique_sparse())
                .build(),
            IndexModel::builder()
                .keys(doc! { "identity.provider": 1, "identity.subject": 1 })
                .options(unique_sparse())
                .build(),
        ];
        self.users()
            .create_indexes(indexes)
            .await
            .map(|_| ())
            .map_err(|e| unavailable("Failed to create user indexes", e))
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, RemoteUnavailable> {
        track_remote_operation("find_user", async {
            self.users()
                .find_one(doc! { "_id": id })
                .await
                .map_err(|e| unavailable("Failed to query user", e))
        })
        .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RemoteUnavailable> {
        track_remote_operation("find_user", async {
            self.users()
                .find_one(doc! { "email": email })
                .await
                .map_err(|e| unavailable("Failed to query user", e))
        })
        .await
    }

    async fn find_by_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> Result<Option<UserRecord>, RemoteUnavailable> {
        track_remote_operation("find_user", async {
            self.users()
                .find_one(doc! { "identity.provider": provider, "identity.subject": subject })
                .await
                .map_err(|e| unavailable("Failed to query user", e))
        })
        .await
    }

    async fn insert(&self, user: &UserRecord) -> Result<(), RemoteUnavailable> {
        track_remote_operation("insert_user", async {
            self.users()
                .insert_one(user)
                .await
                .map(|_| ())
                .map_err(|e| unavailable("Failed to insert user", e))
        })
        .await
    }

    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), RemoteUnavailable> {
        track_remote_operation("touch_user", async {
            self.users()
                .update_one(
                    doc! { "_id": id },
                    doc! { "$set": { "lastLoginAt": chrono_to_bson(at) } },
                )
                .await
                .map(|_| ())
                .map_err(|e| unavailable("Failed to update last login timestamp", e))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::FixedClock;
    use chrono::TimeZone;

    #[tokio::test]
    async fn documents_are_stamped_by_the_store_clock() {
        // Building a client does not connect.
        let client = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let store = MongoRemoteStore::new(
            client.database("ikigai_test"),
            Arc::new(FixedClock::new(at)),
        );

        let progress = store.progress_document("u1", &UserProgress::default());
        assert_eq!(progress.user_id, "u1");
        assert_eq!(progress.saved_at, at);
        assert_eq!(
            store.settings_document("u1", &UserSettings::default()).saved_at,
            at
        );
    }
}
