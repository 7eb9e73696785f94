#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use ikigai_api::{
    config::{Config, StorageBackend},
    create_router,
    services::{
        storage::{MemoryLocalCache, MemoryRemoteStore, MemoryUserDirectory},
        AppState,
    },
    utils::time::FixedClock,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub remote: Arc<MemoryRemoteStore>,
    pub cache: Arc<MemoryLocalCache>,
    pub clock: Arc<FixedClock>,
}

pub fn test_config() -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        mongo_uri: "mongodb://unused".to_string(),
        mongo_database: "ikigai_test".to_string(),
        redis_uri: "redis://unused".to_string(),
        jwt_secret: "test-secret".to_string(),
        access_token_ttl_seconds: 3600,
        bcrypt_cost: 4,
        remote_timeout_ms: 200,
        storage_backend: StorageBackend::Memory,
        trusted_providers: vec!["google".to_string()],
    }
}

/// Router over in-memory backends whose failure switches stay reachable.
pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let remote = Arc::new(MemoryRemoteStore::new());
    let cache = Arc::new(MemoryLocalCache::new());
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
    ));

    let state = Arc::new(
        AppState::with_backends(
            test_config(),
            remote.clone(),
            cache.clone(),
            Arc::new(MemoryUserDirectory::new()),
            clock.clone(),
        )
        .expect("Failed to initialize test app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        remote,
        cache,
        clock,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };
        (status, body)
    }

    /// Registers a user and returns `(access_token, user_id)`.
    pub async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["access_token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    /// Signs in with the password used by [`TestApp::register`].
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["access_token"].as_str().unwrap().to_string()
    }
}
