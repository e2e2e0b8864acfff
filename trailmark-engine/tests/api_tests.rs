//! Integration tests for the trailmark-engine HTTP API
//!
//! Tests cover:
//! - Recognition across new-user, fingerprint, and session-token paths
//! - Registration, login, and logout flows
//! - Activity tracking and its counter side effects
//! - Per-user analytics and conversion scoring
//! - Health endpoint

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method

use trailmark_common::config::EngineSettings;
use trailmark_common::db::init_database;
use trailmark_engine::{build_router, AppState};

/// Test helper: fresh database in a temp directory
async fn setup_test_db() -> (SqlitePool, EngineSettings, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db_path = dir.path().join("trailmark.db");
    let pool = init_database(&db_path)
        .await
        .expect("Should initialize database");
    let settings = EngineSettings::load(&pool)
        .await
        .expect("Should load settings");
    (pool, settings, dir)
}

async fn setup_app() -> (axum::Router, SqlitePool, tempfile::TempDir) {
    let (pool, settings, dir) = setup_test_db().await;
    let state = AppState::new(pool.clone(), settings);
    (build_router(state), pool, dir)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("user-agent", "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// High-confidence fingerprint payload (userAgent + screen + timezone +
/// canvas + webgl scores 70, above the default threshold of 60)
fn strong_fingerprint() -> Value {
    json!({
        "components": {
            "userAgent": "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0",
            "screenResolution": [1920, 1080],
            "timezone": "Europe/Berlin",
            "canvas": "canvas-hash-abc",
            "webgl": {"vendor": "Google Inc.", "renderer": "ANGLE"}
        }
    })
}

/// Weak fingerprint (language + timezone scores 15, below threshold)
fn weak_fingerprint() -> Value {
    json!({
        "components": {
            "language": "de-DE",
            "timezone": "Europe/Berlin"
        }
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool, _dir) = setup_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "trailmark-engine");
    assert!(body["version"].is_string());
}

// =============================================================================
// Recognition
// =============================================================================

#[tokio::test]
async fn test_first_visit_creates_anonymous_user() {
    let (app, _pool, _dir) = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["recognition_method"], "new");
    assert_eq!(body["is_returning"], false);
    assert_eq!(body["user"]["user_type"], "anonymous");
    assert_eq!(body["user"]["journey_stage"], "first_visit");
    assert_eq!(body["user"]["total_sessions"], 1);
    assert!(body["session"]["session_token"].is_string());
    assert_eq!(body["session"]["is_active"], true);
}

#[tokio::test]
async fn test_returning_visitor_recognized_by_fingerprint() {
    let (app, _pool, _dir) = setup_app().await;

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();
    let first = extract_json(first.into_body()).await;

    // Same fingerprint, no token: must land on the same user and promote it.
    let second = app
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second = extract_json(second.into_body()).await;

    assert_eq!(second["recognition_method"], "fingerprint");
    assert_eq!(second["is_returning"], true);
    assert_eq!(second["user"]["id"], first["user"]["id"]);
    assert_eq!(second["user"]["user_type"], "returning");
    assert_eq!(second["user"]["journey_stage"], "engaged");
    assert_eq!(second["user"]["total_sessions"], 2);
    assert_ne!(
        second["session"]["session_token"],
        first["session"]["session_token"]
    );
}

#[tokio::test]
async fn test_low_confidence_fingerprint_creates_separate_users() {
    let (app, _pool, _dir) = setup_app().await;

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": weak_fingerprint()}),
        ))
        .await
        .unwrap();
    let first = extract_json(first.into_body()).await;
    assert_eq!(first["recognition_method"], "new");

    let second = app
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": weak_fingerprint()}),
        ))
        .await
        .unwrap();
    let second = extract_json(second.into_body()).await;

    assert_eq!(second["recognition_method"], "new");
    assert_eq!(second["is_returning"], false);
    assert_ne!(second["user"]["id"], first["user"]["id"]);
}

#[tokio::test]
async fn test_session_token_wins_over_fingerprint() {
    let (app, _pool, _dir) = setup_app().await;

    // User A with one fingerprint.
    let a = app
        .clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();
    let a = extract_json(a.into_body()).await;

    // User B with a different fingerprint.
    let b_fingerprint = json!({
        "components": {
            "userAgent": "Mozilla/5.0 (Macintosh) Firefox/121.0",
            "screenResolution": [2560, 1440],
            "timezone": "America/New_York",
            "canvas": "canvas-hash-xyz",
            "webgl": {"vendor": "Apple", "renderer": "Apple M1"}
        }
    });
    let b = app
        .clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": b_fingerprint}),
        ))
        .await
        .unwrap();
    let b = extract_json(b.into_body()).await;
    assert_ne!(a["user"]["id"], b["user"]["id"]);

    // B's token plus A's fingerprint: the token decides identity.
    let resolved = app
        .oneshot(post_json(
            "/api/recognize",
            json!({
                "session_token": b["session"]["session_token"],
                "fingerprint": strong_fingerprint()
            }),
        ))
        .await
        .unwrap();
    let resolved = extract_json(resolved.into_body()).await;

    assert_eq!(resolved["recognition_method"], "session_token");
    assert_eq!(resolved["user"]["id"], b["user"]["id"]);
}

#[tokio::test]
async fn test_device_id_fallback_recognizes_anonymous_user() {
    let (app, _pool, _dir) = setup_app().await;

    let first = app
        .clone()
        .oneshot(post_json("/api/recognize", json!({"device_id": "device-42"})))
        .await
        .unwrap();
    let first = extract_json(first.into_body()).await;
    assert_eq!(first["recognition_method"], "new");

    let second = app
        .oneshot(post_json("/api/recognize", json!({"device_id": "device-42"})))
        .await
        .unwrap();
    let second = extract_json(second.into_body()).await;

    assert_eq!(second["recognition_method"], "fingerprint");
    assert_eq!(second["is_returning"], true);
    assert_eq!(second["user"]["id"], first["user"]["id"]);
    assert_eq!(second["user"]["user_type"], "returning");
}

#[tokio::test]
async fn test_recognize_with_unknown_token_falls_through() {
    let (app, _pool, _dir) = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/api/recognize",
            json!({"session_token": "no-such-token"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["recognition_method"], "new");
}

// =============================================================================
// Registration / login / logout
// =============================================================================

#[tokio::test]
async fn test_register_converts_anonymous_user() {
    let (app, _pool, _dir) = setup_app().await;

    let visit = app
        .clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();
    let visit = extract_json(visit.into_body()).await;

    let response = app
        .oneshot(post_json(
            "/api/register",
            json!({
                "email": "ada@example.com",
                "password": "correct-horse",
                "name": "Ada",
                "user_id": visit["user"]["id"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["id"], visit["user"]["id"]);
    assert_eq!(body["user"]["user_type"], "registered");
    assert_eq!(body["user"]["journey_stage"], "converted");
    assert_eq!(body["user"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_register_rejects_taken_email() {
    let (app, _pool, _dir) = setup_app().await;

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/register",
            json!({"email": "ada@example.com", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(post_json(
            "/api/register",
            json!({"email": "ada@example.com", "password": "battery-staple"}),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_already_registered_user() {
    let (app, _pool, _dir) = setup_app().await;

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/register",
            json!({"email": "ada@example.com", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    let first = extract_json(first.into_body()).await;

    let again = app
        .oneshot(post_json(
            "/api/register",
            json!({
                "email": "other@example.com",
                "password": "battery-staple",
                "user_id": first["user"]["id"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validates_input() {
    let (app, _pool, _dir) = setup_app().await;

    let bad_email = app
        .clone()
        .oneshot(post_json(
            "/api/register",
            json!({"email": "not-an-email", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let short_password = app
        .oneshot(post_json(
            "/api/register",
            json!({"email": "ada@example.com", "password": "short"}),
        ))
        .await
        .unwrap();
    assert_eq!(short_password.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_round_trip() {
    let (app, _pool, _dir) = setup_app().await;

    app.clone()
        .oneshot(post_json(
            "/api/register",
            json!({"email": "ada@example.com", "password": "correct-horse"}),
        ))
        .await
        .unwrap();

    let ok = app
        .clone()
        .oneshot(post_json(
            "/api/login",
            json!({"email": "ada@example.com", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let ok = extract_json(ok.into_body()).await;
    assert!(ok["access_token"].is_string());
    assert_eq!(ok["user"]["user_type"], "registered");

    let wrong_password = app
        .clone()
        .oneshot(post_json(
            "/api/login",
            json!({"email": "ada@example.com", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let unknown_email = app
        .oneshot(post_json(
            "/api/login",
            json!({"email": "nobody@example.com", "password": "correct-horse"}),
        ))
        .await
        .unwrap();
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let (app, _pool, _dir) = setup_app().await;

    let visit = app
        .clone()
        .oneshot(post_json("/api/recognize", json!({})))
        .await
        .unwrap();
    let visit = extract_json(visit.into_body()).await;
    let token = visit["session"]["session_token"].as_str().unwrap();

    let first = app
        .clone()
        .oneshot(post_json("/api/logout", json!({"session_token": token})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = extract_json(first.into_body()).await;
    assert_eq!(first["success"], true);

    let second = app
        .clone()
        .oneshot(post_json("/api/logout", json!({"session_token": token})))
        .await
        .unwrap();
    let second = extract_json(second.into_body()).await;
    assert_eq!(second["success"], false);

    // A logged-out token is never revalidated: recognition starts over.
    let after = app
        .oneshot(post_json("/api/recognize", json!({"session_token": token})))
        .await
        .unwrap();
    let after = extract_json(after.into_body()).await;
    assert_eq!(after["recognition_method"], "new");
}

// =============================================================================
// Activity tracking
// =============================================================================

#[tokio::test]
async fn test_track_activity_bumps_counters() {
    let (app, _pool, _dir) = setup_app().await;

    let visit = app
        .clone()
        .oneshot(post_json("/api/recognize", json!({})))
        .await
        .unwrap();
    let visit = extract_json(visit.into_body()).await;
    let token = visit["session"]["session_token"].as_str().unwrap();
    let user_id = visit["user"]["id"].as_str().unwrap();

    let tracked = app
        .clone()
        .oneshot(post_json(
            "/api/activity",
            json!({
                "session_token": token,
                "activity_type": "message_sent",
                "conversation_id": "conv-1"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(tracked.status(), StatusCode::OK);
    let tracked = extract_json(tracked.into_body()).await;
    assert_eq!(tracked["activity_type"], "message_sent");
    assert_eq!(tracked["user_id"], user_id);

    let analytics = app
        .oneshot(get(&format!("/api/users/{}/analytics", user_id)))
        .await
        .unwrap();
    let analytics = extract_json(analytics.into_body()).await;
    assert_eq!(analytics["analytics"]["total_messages"], 1);
    assert_eq!(analytics["analytics"]["has_conversations"], true);
    // first_visit + session_start + message_sent
    assert_eq!(analytics["analytics"]["total_activities"], 3);
    assert!(analytics["analytics"]["engagement_score"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn test_track_activity_rejects_bad_input() {
    let (app, _pool, _dir) = setup_app().await;

    let visit = app
        .clone()
        .oneshot(post_json("/api/recognize", json!({})))
        .await
        .unwrap();
    let visit = extract_json(visit.into_body()).await;
    let token = visit["session"]["session_token"].as_str().unwrap();

    let bad_type = app
        .clone()
        .oneshot(post_json(
            "/api/activity",
            json!({"session_token": token, "activity_type": "teleported"}),
        ))
        .await
        .unwrap();
    assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);

    let bad_token = app
        .oneshot(post_json(
            "/api/activity",
            json!({"session_token": "no-such-token", "activity_type": "chat_start"}),
        ))
        .await
        .unwrap();
    assert_eq!(bad_token.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn test_analytics_unknown_user_is_404() {
    let (app, _pool, _dir) = setup_app().await;

    let response = app
        .oneshot(get(&format!(
            "/api/users/{}/analytics",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_analytics_for_fresh_user() {
    let (app, _pool, _dir) = setup_app().await;

    let visit = app
        .clone()
        .oneshot(post_json("/api/recognize", json!({})))
        .await
        .unwrap();
    let visit = extract_json(visit.into_body()).await;
    let user_id = visit["user"]["id"].as_str().unwrap();

    let response = app
        .oneshot(get(&format!("/api/users/{}/analytics", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let analytics = &body["analytics"];
    assert_eq!(analytics["total_sessions"], 1);
    assert_eq!(analytics["active_sessions"], 1);
    assert_eq!(analytics["has_multiple_sessions"], false);
    assert_eq!(analytics["has_conversations"], false);
    assert_eq!(analytics["engagement_trend"], "insufficient_data");
    // Fresh anonymous user scores zero.
    assert_eq!(body["conversion_score"], 0);
}

#[tokio::test]
async fn test_engagement_trend_survives_ended_sessions() {
    let (app, _pool, _dir) = setup_app().await;

    // Three sessions for the same user; messages sent in two of them.
    let mut tokens = Vec::new();
    let mut user_id = String::new();
    for _ in 0..3 {
        let visit = app
            .clone()
            .oneshot(post_json(
                "/api/recognize",
                json!({"fingerprint": strong_fingerprint()}),
            ))
            .await
            .unwrap();
        let visit = extract_json(visit.into_body()).await;
        user_id = visit["user"]["id"].as_str().unwrap().to_string();
        tokens.push(visit["session"]["session_token"].as_str().unwrap().to_string());
    }
    for token in &tokens[..2] {
        app.clone()
            .oneshot(post_json(
                "/api/activity",
                json!({"session_token": token, "activity_type": "message_sent"}),
            ))
            .await
            .unwrap();
    }

    // End every session; the trend must still reflect the messaging.
    for token in &tokens {
        app.clone()
            .oneshot(post_json("/api/logout", json!({"session_token": token})))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(get(&format!("/api/users/{}/analytics", user_id)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["analytics"]["active_sessions"], 0);
    assert_eq!(body["analytics"]["engagement_trend"], "moderately_engaged");
}

#[tokio::test]
async fn test_conversion_score_grows_with_engagement() {
    let (app, _pool, _dir) = setup_app().await;

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();
    let first = extract_json(first.into_body()).await;
    let user_id = first["user"]["id"].as_str().unwrap();

    // Return visit promotes to returning/engaged and adds a second session.
    app.clone()
        .oneshot(post_json(
            "/api/recognize",
            json!({"fingerprint": strong_fingerprint()}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/api/users/{}/analytics", user_id)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;

    // returning (30) + engaged (20) + multiple sessions (20)
    assert_eq!(body["conversion_score"], 70);
    assert_eq!(body["analytics"]["has_multiple_sessions"], true);
}
