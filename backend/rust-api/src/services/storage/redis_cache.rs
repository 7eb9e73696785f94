use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{CacheError, LocalCache};
use crate::metrics::{record_cache_hit, record_cache_miss, track_cache_operation};

fn backend(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

/// Local cache on Redis string keys.
#[derive(Clone)]
pub struct RedisLocalCache {
    redis: ConnectionManager,
}

impl RedisLocalCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl LocalCache for RedisLocalCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.clone();
        let value: Option<String> = track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(backend)
        })
        .await?;

        if value.is_some() {
            record_cache_hit();
        } else {
            record_cache_miss();
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        track_cache_operation("set", async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await
                .map_err(backend)
        })
        .await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_seconds.max(1))
                .arg(value)
                .query_async::<()>(&mut conn)
                .await
                .map_err(backend)
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut conn)
                .await
                .map_err(backend)
        })
        .await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(backend)
    }
}
