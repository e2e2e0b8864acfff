//! Database initialization
//!
//! Creates the database on first run, applies schema idempotently, and
//! initializes default settings.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connect-time options apply to every pooled connection:
    // - WAL mode allows concurrent readers with one writer; the engine
    //   handles many request-parallel resolutions against the same database
    // - busy timeout makes concurrent writers wait for locks rather than
    //   failing immediately
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Schema creation (idempotent - safe to call multiple times)
    create_users_table(&pool).await?;
    create_journey_history_table(&pool).await?;
    create_user_fingerprints_table(&pool).await?;
    create_user_sessions_table(&pool).await?;
    create_activity_records_table(&pool).await?;
    create_settings_table(&pool).await?;

    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create the users table
///
/// Identity anchor for the recognition engine. `user_type` and
/// `journey_stage` only ever move forward; `email` is unique once set.
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT UNIQUE,
            password_hash TEXT,
            password_salt TEXT,
            name TEXT,
            user_type TEXT NOT NULL DEFAULT 'anonymous'
                CHECK (user_type IN ('anonymous', 'returning', 'registered')),
            journey_stage TEXT NOT NULL DEFAULT 'first_visit'
                CHECK (journey_stage IN ('first_visit', 'engaged', 'converted')),
            device_id TEXT,
            total_sessions INTEGER NOT NULL DEFAULT 0,
            total_messages INTEGER NOT NULL DEFAULT 0,
            engagement_score INTEGER NOT NULL DEFAULT 0,
            first_visit_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (total_sessions >= 0),
            CHECK (total_messages >= 0),
            CHECK (engagement_score >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
        .execute(pool)
        .await?;
    // Device-id fallback lookup: most recent anonymous user for a device
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_device ON users(device_id, user_type)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the journey_history table
///
/// First-class append-only log of type/stage transitions, one row per
/// changed field. Owned by the user and cascade-deleted with it.
async fn create_journey_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS journey_history (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            field TEXT NOT NULL CHECK (field IN ('type', 'stage')),
            from_value TEXT NOT NULL,
            to_value TEXT NOT NULL,
            changed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_journey_history_user ON journey_history(user_id, changed_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the user_fingerprints table
///
/// One row per (user, fingerprint hash); repeat observations update the
/// existing row. The uniqueness constraint is what makes concurrent
/// double-creation recoverable as a lookup-then-update.
async fn create_user_fingerprints_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_fingerprints (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            fingerprint_hash TEXT NOT NULL,
            raw_components TEXT NOT NULL,
            browser TEXT,
            os TEXT,
            device_type TEXT,
            screen_resolution TEXT,
            timezone TEXT,
            language TEXT,
            confidence_score INTEGER NOT NULL DEFAULT 50,
            components_count INTEGER NOT NULL DEFAULT 0,
            first_seen_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            times_seen INTEGER NOT NULL DEFAULT 1,
            UNIQUE (user_id, fingerprint_hash),
            CHECK (length(fingerprint_hash) = 64),
            CHECK (confidence_score >= 0 AND confidence_score <= 100),
            CHECK (times_seen >= 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON user_fingerprints(fingerprint_hash)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_fingerprints_user ON user_fingerprints(user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the user_sessions table
///
/// `session_token` is unique across all sessions, ever. `is_active` only
/// transitions true to false.
async fn create_user_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            session_token TEXT NOT NULL UNIQUE,
            fingerprint_hash TEXT,
            ip_address TEXT,
            user_agent TEXT,
            device_info TEXT,
            started_at TEXT NOT NULL,
            last_activity_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            page_views INTEGER NOT NULL DEFAULT 0,
            messages_sent INTEGER NOT NULL DEFAULT 0,
            duration_seconds INTEGER NOT NULL DEFAULT 0,
            logout_at TEXT,
            logout_reason TEXT,
            CHECK (page_views >= 0),
            CHECK (messages_sent >= 0),
            CHECK (duration_seconds >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_token ON user_sessions(session_token)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON user_sessions(user_id)")
        .execute(pool)
        .await?;
    // Sweep query: active sessions ordered by staleness
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_activity ON user_sessions(is_active, last_activity_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the activity_records table
///
/// Append-only analytics events. `user_id` is a weak reference (no FK) so
/// record retention never constrains user deletion ordering.
async fn create_activity_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_records (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            activity_type TEXT NOT NULL
                CHECK (activity_type IN (
                    'first_visit', 'chat_start', 'message_sent', 'feedback_given',
                    'registration', 'login', 'session_start', 'session_end'
                )),
            conversation_id TEXT,
            metadata TEXT,
            duration_seconds INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_activities_user ON activity_records(user_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores engine configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Recognition settings
    ensure_setting(pool, "fingerprint_confidence_threshold", "60").await?;

    // Session settings
    ensure_setting(pool, "session_ttl_hours", "24").await?;
    ensure_setting(pool, "session_sweep_cutoff_hours", "48").await?;
    ensure_setting(pool, "session_sweep_interval_secs", "3600").await?;

    // Access token settings
    ensure_setting(pool, "access_token_ttl_days", "7").await?;
    init_access_token_secret(pool).await?;

    info!("Default settings initialized");
    Ok(())
}

/// Generate and store the access token signing secret if not present
async fn init_access_token_secret(pool: &SqlitePool) -> Result<()> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'access_token_secret'")
            .fetch_optional(pool)
            .await?;

    if let Some(value) = existing {
        if !value.trim().is_empty() {
            return Ok(());
        }
        warn!("Setting 'access_token_secret' was empty, regenerating");
    }

    let secret = generate_secret();

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('access_token_secret', ?)")
        .bind(&secret)
        .execute(pool)
        .await?;

    info!("Initialized access token signing secret");
    Ok(())
}

/// Generate a crypto-random URL-safe secret (256 bits)
fn generate_secret() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // Use INSERT OR IGNORE to handle concurrent initialization races:
        // multiple tasks may pass the exists check simultaneously
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secret_is_url_safe_and_long() {
        let secret = generate_secret();
        // 32 bytes base64url without padding is 43 chars
        assert_eq!(secret.len(), 43);
        assert!(secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }
}
