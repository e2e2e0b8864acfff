//! Fingerprint persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use trailmark_common::{time, Error, Result};
use uuid::Uuid;

use crate::models::UserFingerprint;

/// Insert a new fingerprint observation.
///
/// Fails with `Error::Conflict` when a row for (user_id, fingerprint_hash)
/// already exists; callers recover by re-reading and updating.
pub async fn insert_fingerprint<'e, E>(executor: E, fp: &UserFingerprint) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let raw = serde_json::to_string(&fp.raw_components)
        .map_err(|e| Error::Internal(format!("Failed to serialize components: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO user_fingerprints (
            id, user_id, fingerprint_hash, raw_components,
            browser, os, device_type, screen_resolution, timezone, language,
            confidence_score, components_count,
            first_seen_at, last_seen_at, times_seen
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(fp.id.to_string())
    .bind(fp.user_id.to_string())
    .bind(&fp.fingerprint_hash)
    .bind(raw)
    .bind(&fp.browser)
    .bind(&fp.os)
    .bind(&fp.device_type)
    .bind(&fp.screen_resolution)
    .bind(&fp.timezone)
    .bind(&fp.language)
    .bind(fp.confidence_score)
    .bind(fp.components_count)
    .bind(time::to_db(fp.first_seen_at))
    .bind(time::to_db(fp.last_seen_at))
    .bind(fp.times_seen)
    .execute(executor)
    .await?;

    Ok(())
}

/// Persist an updated observation (lastSeenAt, timesSeen, confidence)
pub async fn update_observation<'e, E>(executor: E, fp: &UserFingerprint) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE user_fingerprints
        SET last_seen_at = ?, times_seen = ?, confidence_score = ?
        WHERE id = ?
        "#,
    )
    .bind(time::to_db(fp.last_seen_at))
    .bind(fp.times_seen)
    .bind(fp.confidence_score)
    .bind(fp.id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

/// Exact-hash lookup across all users; most recently seen row wins
pub async fn get_by_hash<'e, E>(executor: E, hash: &str) -> Result<Option<UserFingerprint>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "{} WHERE fingerprint_hash = ? ORDER BY last_seen_at DESC LIMIT 1",
        SELECT_FINGERPRINT
    ))
    .bind(hash)
    .fetch_optional(executor)
    .await?;

    row.map(row_to_fingerprint).transpose()
}

/// Lookup the unique (user, hash) row
pub async fn get_by_user_and_hash<'e, E>(
    executor: E,
    user_id: Uuid,
    hash: &str,
) -> Result<Option<UserFingerprint>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "{} WHERE user_id = ? AND fingerprint_hash = ?",
        SELECT_FINGERPRINT
    ))
    .bind(user_id.to_string())
    .bind(hash)
    .fetch_optional(executor)
    .await?;

    row.map(row_to_fingerprint).transpose()
}

/// Number of distinct fingerprints recorded for a user
pub async fn count_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_fingerprints WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_one(executor)
            .await?;

    Ok(count)
}

const SELECT_FINGERPRINT: &str = r#"
    SELECT id, user_id, fingerprint_hash, raw_components,
           browser, os, device_type, screen_resolution, timezone, language,
           confidence_score, components_count,
           first_seen_at, last_seen_at, times_seen
    FROM user_fingerprints
"#;

fn row_to_fingerprint(row: SqliteRow) -> Result<UserFingerprint> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let raw: String = row.get("raw_components");
    let first_seen_at: String = row.get("first_seen_at");
    let last_seen_at: String = row.get("last_seen_at");

    Ok(UserFingerprint {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid fingerprint id: {}", e)))?,
        user_id: Uuid::parse_str(&user_id)
            .map_err(|e| Error::Internal(format!("Invalid user id: {}", e)))?,
        fingerprint_hash: row.get("fingerprint_hash"),
        raw_components: serde_json::from_str(&raw)
            .map_err(|e| Error::Internal(format!("Failed to deserialize components: {}", e)))?,
        browser: row.get("browser"),
        os: row.get("os"),
        device_type: row.get("device_type"),
        screen_resolution: row.get("screen_resolution"),
        timezone: row.get("timezone"),
        language: row.get("language"),
        confidence_score: row.get("confidence_score"),
        components_count: row.get("components_count"),
        first_seen_at: time::from_db(&first_seen_at)?,
        last_seen_at: time::from_db(&last_seen_at)?,
        times_seen: row.get("times_seen"),
    })
}
