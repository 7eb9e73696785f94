use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth_service::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// MongoDB remote store, Redis local cache.
    Mongo,
    /// In-process maps, for local development and tests.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    pub remote_timeout_ms: u64,
    pub storage_backend: StorageBackend,
    pub trusted_providers: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{APP_ENV}.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, env_key: &str| -> Option<String> {
            settings
                .get_string(key)
                .or_else(|_| env::var(env_key))
                .ok()
                .filter(|value| !value.trim().is_empty())
        };

        let jwt_secret = match lookup("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            None => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let trusted_providers = lookup("auth.trusted_providers", "TRUSTED_PROVIDERS")
            .map(|raw| {
                raw.split(',')
                    .map(|p| p.trim().to_ascii_lowercase())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["google".to_string(), "apple".to_string()]);

        Ok(Config {
            listen_addr: lookup("server.listen_addr", "LISTEN_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8081".to_string()),
            mongo_uri: lookup("database.mongo_uri", "MONGO_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
            mongo_database: lookup("database.mongo_database", "MONGO_DATABASE")
                .unwrap_or_else(|| "ikigai".to_string()),
            redis_uri: lookup("redis.uri", "REDIS_URI")
                .unwrap_or_else(|| "redis://127.0.0.1:6379/0".to_string()),
            jwt_secret,
            access_token_ttl_seconds: parse_or(
                lookup("auth.access_token_ttl_seconds", "JWT_ACCESS_TOKEN_TTL_SECONDS"),
                "access_token_ttl_seconds",
                3600,
            )?,
            bcrypt_cost: parse_or(lookup("auth.bcrypt_cost", "BCRYPT_COST"), "bcrypt_cost", 12)?,
            remote_timeout_ms: parse_or(
                lookup("storage.remote_timeout_ms", "REMOTE_TIMEOUT_MS"),
                "remote_timeout_ms",
                2000,
            )?,
            storage_backend: parse_or(
                lookup("storage.backend", "STORAGE_BACKEND"),
                "storage_backend",
                StorageBackend::Mongo,
            )?,
            trusted_providers,
        })
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms.max(1))
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            access_token_ttl_seconds: self.access_token_ttl_seconds,
            bcrypt_cost: self.bcrypt_cost,
            trusted_providers: self.trusted_providers.clone(),
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid {}: {}", key, e))),
        None => Ok(default),
    }
}
