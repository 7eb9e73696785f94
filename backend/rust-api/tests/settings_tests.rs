use axum::http::StatusCode;
use serde_json::json;

mod common;

fn custom_settings() -> serde_json::Value {
    json!({
        "notifications": false,
        "sounds": false,
        "dark_mode": true,
        "daily_reminders": true,
        "meditation_sounds": false,
        "data_privacy": "friends",
        "language": "es"
    })
}

#[tokio::test]
async fn test_get_settings_defaults() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;

    let (status, body) = app.send("GET", "/api/v1/settings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "notifications": true,
            "sounds": true,
            "dark_mode": false,
            "daily_reminders": true,
            "meditation_sounds": true,
            "data_privacy": "private",
            "language": "en"
        })
    );
}

#[tokio::test]
async fn test_save_settings_persists() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;

    let (status, body) = app
        .send("PUT", "/api/v1/settings", Some(&token), Some(custom_settings()))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["settings"], custom_settings());
    assert_eq!(body["sync"]["outcome"], "remote");

    let (_, body) = app.send("GET", "/api/v1/settings", Some(&token), None).await;
    assert_eq!(body, custom_settings());
}

#[tokio::test]
async fn test_invalid_settings_rejected_and_unchanged() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;

    let mut wrong_type = custom_settings();
    wrong_type["dark_mode"] = json!("yes");
    let (status, body) = app
        .send("PUT", "/api/v1/settings", Some(&token), Some(wrong_type))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "dark_mode");

    let mut unknown_key = custom_settings();
    unknown_key["theme"] = json!("ocean");
    let (status, body) = app
        .send("PUT", "/api/v1/settings", Some(&token), Some(unknown_key))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "theme");

    let mut bad_language = custom_settings();
    bad_language["language"] = json!("klingon");
    let (status, body) = app
        .send("PUT", "/api/v1/settings", Some(&token), Some(bad_language))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "language");

    let (_, body) = app.send("GET", "/api/v1/settings", Some(&token), None).await;
    assert_eq!(body["dark_mode"], false);
    assert_eq!(body["language"], "en");
}

#[tokio::test]
async fn test_settings_survive_progress_reset() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;

    app.send("PUT", "/api/v1/settings", Some(&token), Some(custom_settings()))
        .await;
    let (status, _) = app.send("DELETE", "/api/v1/progress", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send("GET", "/api/v1/settings", Some(&token), None).await;
    assert_eq!(body, custom_settings());
}

#[tokio::test]
async fn test_settings_saved_locally_when_remote_is_down() {
    let app = common::create_test_app();
    let (token, _) = app.register("ana@example.com").await;

    app.remote.set_available(false);
    let (status, body) = app
        .send("PUT", "/api/v1/settings", Some(&token), Some(custom_settings()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sync"]["outcome"], "local_only");

    let (_, body) = app.send("GET", "/api/v1/settings", Some(&token), None).await;
    assert_eq!(body, custom_settings());
}
