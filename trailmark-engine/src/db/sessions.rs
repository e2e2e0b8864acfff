//! Session persistence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use trailmark_common::{time, Error, Result};
use uuid::Uuid;

use crate::models::UserSession;

/// Insert a newly issued session.
///
/// Fails with `Error::Conflict` on a duplicate session token (the store
/// enforces global token uniqueness).
pub async fn insert_session<'e, E>(executor: E, session: &UserSession) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let device_info = session
        .device_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize device info: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO user_sessions (
            id, user_id, session_token, fingerprint_hash,
            ip_address, user_agent, device_info,
            started_at, last_activity_at, expires_at, is_active,
            page_views, messages_sent, duration_seconds,
            logout_at, logout_reason
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .bind(&session.session_token)
    .bind(&session.fingerprint_hash)
    .bind(&session.ip_address)
    .bind(&session.user_agent)
    .bind(device_info)
    .bind(time::to_db(session.started_at))
    .bind(time::to_db(session.last_activity_at))
    .bind(time::to_db(session.expires_at))
    .bind(session.is_active)
    .bind(session.page_views)
    .bind(session.messages_sent)
    .bind(session.duration_seconds)
    .bind(session.logout_at.map(time::to_db))
    .bind(&session.logout_reason)
    .execute(executor)
    .await?;

    Ok(())
}

/// Exact token lookup
pub async fn get_by_token<'e, E>(executor: E, token: &str) -> Result<Option<UserSession>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE session_token = ?", SELECT_SESSION))
        .bind(token)
        .fetch_optional(executor)
        .await?;

    row.map(row_to_session).transpose()
}

/// Persist activity counters and the recomputed duration
pub async fn update_activity<'e, E>(executor: E, session: &UserSession) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE user_sessions
        SET last_activity_at = ?, page_views = ?, messages_sent = ?, duration_seconds = ?
        WHERE id = ? AND is_active = 1
        "#,
    )
    .bind(time::to_db(session.last_activity_at))
    .bind(session.page_views)
    .bind(session.messages_sent)
    .bind(session.duration_seconds)
    .bind(session.id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

/// One-way deactivation: freezes duration and records the logout reason.
/// Idempotent - a session that is already inactive is left untouched.
pub async fn deactivate<'e, E>(
    executor: E,
    session_id: Uuid,
    logout_at: DateTime<Utc>,
    reason: &str,
) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE user_sessions
        SET is_active = 0,
            logout_at = ?,
            logout_reason = ?,
            duration_seconds = MAX(0, CAST(strftime('%s', last_activity_at) AS INTEGER)
                                      - CAST(strftime('%s', started_at) AS INTEGER))
        WHERE id = ? AND is_active = 1
        "#,
    )
    .bind(time::to_db(logout_at))
    .bind(reason)
    .bind(session_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Batch-deactivate active sessions whose last activity predates the cutoff.
/// Returns the number of sessions deactivated. Only ever flips is_active
/// true to false, so racing `validate` is safe.
pub async fn sweep_inactive<'e, E>(
    executor: E,
    cutoff: DateTime<Utc>,
    swept_at: DateTime<Utc>,
) -> Result<u64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE user_sessions
        SET is_active = 0,
            logout_at = ?,
            logout_reason = 'expired',
            duration_seconds = MAX(0, CAST(strftime('%s', last_activity_at) AS INTEGER)
                                      - CAST(strftime('%s', started_at) AS INTEGER))
        WHERE is_active = 1 AND last_activity_at < ?
        "#,
    )
    .bind(time::to_db(swept_at))
    .bind(time::to_db(cutoff))
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Sessions for a user, most recently active first
pub async fn list_for_user<'e, E>(
    executor: E,
    user_id: Uuid,
    active_only: bool,
) -> Result<Vec<UserSession>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let query = if active_only {
        format!(
            "{} WHERE user_id = ? AND is_active = 1 ORDER BY last_activity_at DESC",
            SELECT_SESSION
        )
    } else {
        format!(
            "{} WHERE user_id = ? ORDER BY last_activity_at DESC",
            SELECT_SESSION
        )
    };

    let rows = sqlx::query(&query)
        .bind(user_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(row_to_session).collect()
}

const SELECT_SESSION: &str = r#"
    SELECT id, user_id, session_token, fingerprint_hash,
           ip_address, user_agent, device_info,
           started_at, last_activity_at, expires_at, is_active,
           page_views, messages_sent, duration_seconds,
           logout_at, logout_reason
    FROM user_sessions
"#;

fn row_to_session(row: SqliteRow) -> Result<UserSession> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let device_info: Option<String> = row.get("device_info");
    let started_at: String = row.get("started_at");
    let last_activity_at: String = row.get("last_activity_at");
    let expires_at: String = row.get("expires_at");
    let logout_at: Option<String> = row.get("logout_at");

    Ok(UserSession {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid session id: {}", e)))?,
        user_id: Uuid::parse_str(&user_id)
            .map_err(|e| Error::Internal(format!("Invalid user id: {}", e)))?,
        session_token: row.get("session_token"),
        fingerprint_hash: row.get("fingerprint_hash"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        device_info: device_info
            .map(|v| {
                serde_json::from_str(&v).map_err(|e| {
                    Error::Internal(format!("Failed to deserialize device info: {}", e))
                })
            })
            .transpose()?,
        started_at: time::from_db(&started_at)?,
        last_activity_at: time::from_db(&last_activity_at)?,
        expires_at: time::from_db(&expires_at)?,
        is_active: row.get("is_active"),
        page_views: row.get("page_views"),
        messages_sent: row.get("messages_sent"),
        duration_seconds: row.get("duration_seconds"),
        logout_at: time::from_db_opt(logout_at)?,
        logout_reason: row.get("logout_reason"),
    })
}
