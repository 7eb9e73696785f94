use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_register_login_and_me() {
    let app = common::create_test_app();
    let (token, user_id) = app.register("ana@example.com").await;

    let (status, body) = app.send("GET", "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["email"], "ana@example.com");

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["id"], user_id.as_str());
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() {
    let app = common::create_test_app();
    app.register("ana@example.com").await;

    let (status, body) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "ana@example.com", "password": "password456" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_register_validation() {
    let app = common::create_test_app();

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "password123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "ana@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = common::create_test_app();

    let response = app
        .send(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com" })),
        )
        .await;
    assert_eq!(response.0, StatusCode::BAD_REQUEST);
    assert_eq!(response.1["status"], 400);
}

#[tokio::test]
async fn test_login_wrong_password_unauthorized() {
    let app = common::create_test_app();
    app.register("ana@example.com").await;

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;
    assert_eq!(app.state.sessions.active_count().await, 1);

    let (status, _) = app.send("POST", "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.state.sessions.active_count().await, 0);

    let (status, _) = app.send("GET", "/api/v1/progress", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = common::create_test_app();

    for (method, uri) in [
        ("GET", "/api/v1/progress"),
        ("DELETE", "/api/v1/progress"),
        ("GET", "/api/v1/recommendations"),
        ("GET", "/api/v1/settings"),
        ("POST", "/api/v1/progress/challenges/digital_detox/complete"),
        ("GET", "/api/v1/auth/me"),
    ] {
        let (status, _) = app.send(method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }

    let (status, _) = app
        .send("GET", "/api/v1/progress", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_provider_login() {
    let app = common::create_test_app();
    let request = json!({ "provider": "Google", "subject": "g-123", "email": "ana@example.com" });

    let (status, first) = app
        .send("POST", "/api/v1/auth/provider", None, Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["user"]["provider"], "google");

    let (_, second) = app
        .send("POST", "/api/v1/auth/provider", None, Some(request))
        .await;
    assert_eq!(first["user"]["id"], second["user"]["id"]);

    let (status, _) = app
        .send(
            "POST",
            "/api/v1/auth/provider",
            None,
            Some(json!({ "provider": "unknown", "subject": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_expires_with_service_clock() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;

    let (status, _) = app.send("GET", "/api/v1/progress", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance_days(1);
    let (status, _) = app.send("GET", "/api/v1/progress", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login("ana@example.com").await;
    let (status, _) = app.send("GET", "/api/v1/progress", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}
