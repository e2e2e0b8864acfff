//! Tests for database initialization and default settings

use std::path::PathBuf;
use trailmark_common::config::EngineSettings;
use trailmark_common::db::init_database;

fn temp_db_path(tag: &str) -> PathBuf {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    // Keep the directory alive for the process lifetime; the OS cleans up /tmp
    let path = dir.path().join(format!("trailmark-{}.db", tag));
    std::mem::forget(dir);
    path
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let db_path = temp_db_path("create");
    assert!(!db_path.exists());

    let result = init_database(&db_path).await;
    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let db_path = temp_db_path("reopen");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());
    drop(pool1);

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let db_path = temp_db_path("settings");
    let pool = init_database(&db_path).await.expect("init");

    let settings = EngineSettings::load(&pool).await.expect("load settings");

    assert_eq!(settings.fingerprint_confidence_threshold, 60);
    assert_eq!(settings.session_ttl_hours, 24);
    assert_eq!(settings.session_sweep_cutoff_hours, 48);
    assert_eq!(settings.session_sweep_interval_secs, 3600);
    assert_eq!(settings.access_token_ttl_days, 7);
    assert!(!settings.access_token_secret.is_empty());
}

#[tokio::test]
async fn test_token_secret_stable_across_reopen() {
    let db_path = temp_db_path("secret");

    let pool1 = init_database(&db_path).await.expect("init");
    let first = EngineSettings::load(&pool1)
        .await
        .expect("load")
        .access_token_secret;
    drop(pool1);

    let pool2 = init_database(&db_path).await.expect("reopen");
    let second = EngineSettings::load(&pool2)
        .await
        .expect("load")
        .access_token_secret;

    assert_eq!(first, second, "Secret must survive reinitialization");
}

#[tokio::test]
async fn test_schema_enforces_token_uniqueness() {
    let db_path = temp_db_path("unique");
    let pool = init_database(&db_path).await.expect("init");

    sqlx::query(
        "INSERT INTO users (id, first_visit_at, last_seen_at, created_at, updated_at)
         VALUES ('u1', '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z',
                 '2026-01-01T00:00:00.000Z', '2026-01-01T00:00:00.000Z')",
    )
    .execute(&pool)
    .await
    .expect("insert user");

    let insert_session = |id: &str| {
        let id = id.to_string();
        let pool = pool.clone();
        async move {
            sqlx::query(
                "INSERT INTO user_sessions (id, user_id, session_token, started_at,
                                            last_activity_at, expires_at)
                 VALUES (?, 'u1', 'tok', '2026-01-01T00:00:00.000Z',
                         '2026-01-01T00:00:00.000Z', '2026-01-02T00:00:00.000Z')",
            )
            .bind(id)
            .execute(&pool)
            .await
        }
    };

    assert!(insert_session("s1").await.is_ok());
    let dup = insert_session("s2").await;
    assert!(dup.is_err(), "Duplicate session token must be rejected");
}
