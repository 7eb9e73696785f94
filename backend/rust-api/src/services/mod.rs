use crate::config::{Config, StorageBackend};
use crate::services::auth_service::{AuthService, IdentityProvider};
use crate::services::catalog_seed::builtin_catalog;
use crate::services::content_service::Catalog;
use crate::services::progress_service::StoreContext;
use crate::services::session_registry::SessionRegistry;
use crate::services::storage::{
    LocalCache, MemoryLocalCache, MemoryRemoteStore, MemoryUserDirectory, MongoRemoteStore,
    MongoUserDirectory, RedisLocalCache, RemoteStore, UserDirectory,
};
use crate::utils::retry::RetryConfig;
use crate::utils::time::{Clock, SystemClock};
use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<Catalog>,
    pub remote: Arc<dyn RemoteStore>,
    pub cache: Arc<dyn LocalCache>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: SessionRegistry,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Builds the state for whichever backend the configuration selects.
    pub async fn connect(config: Config) -> anyhow::Result<Self> {
        match config.storage_backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Self::in_memory(config, Arc::new(SystemClock))
            }
            StorageBackend::Mongo => {
                let mongo_client = MongoClient::with_uri_str(&config.mongo_uri).await?;
                tracing::info!("MongoDB client created");
                let redis_client = redis::Client::open(config.redis_uri.clone())?;
                Self::new(config, mongo_client, redis_client).await
            }
        }
    }

    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let users = MongoUserDirectory::new(mongo.clone());
        // Missing indexes only weaken duplicate detection, so keep serving.
        if let Err(e) = users.ensure_indexes().await {
            tracing::warn!("Failed to ensure user indexes: {}", e);
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_backends(
            config,
            Arc::new(MongoRemoteStore::new(mongo, Arc::clone(&clock))),
            Arc::new(RedisLocalCache::new(redis)),
            Arc::new(users),
            clock,
        )
    }

    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        Self::with_backends(
            config,
            Arc::new(MemoryRemoteStore::new()),
            Arc::new(MemoryLocalCache::new()),
            Arc::new(MemoryUserDirectory::new()),
            clock,
        )
    }

    pub fn with_backends(
        config: Config,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let catalog = Arc::new(builtin_catalog()?);
        tracing::info!(
            islands = catalog.islands().len(),
            modules = catalog.modules().len(),
            "Content catalog loaded"
        );

        let identity = Arc::new(AuthService::new(
            users,
            Arc::clone(&cache),
            Arc::clone(&clock),
            config.auth_settings(),
        ));

        let sessions = SessionRegistry::new(
            StoreContext {
                catalog: Arc::clone(&catalog),
                remote: Arc::clone(&remote),
                cache: Arc::clone(&cache),
                clock: Arc::clone(&clock),
                retry: RetryConfig::default(),
                remote_timeout: config.remote_timeout(),
            },
            chrono::Duration::seconds(config.access_token_ttl_seconds.max(1)),
        );

        Ok(Self {
            config,
            catalog,
            remote,
            cache,
            identity,
            sessions,
            clock,
        })
    }
}

pub mod auth_service;
pub mod catalog_seed;
pub mod content_service;
pub mod progress_service;
pub mod recommendation_service;
pub mod session_registry;
pub mod storage;
