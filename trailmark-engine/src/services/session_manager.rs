//! Session lifetime management
//!
//! Issues bounded-lifetime sessions, validates and refreshes them on use,
//! and tears them down on logout or expiry.

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use trailmark_common::Result;

use crate::db;
use crate::fingerprint::DeviceInfo;
use crate::models::{User, UserSession};
use crate::services::{tokens, RequestMeta};

/// Issue a new session for `user` inside the caller's transaction.
///
/// Inserts the session row and bumps the user's session counter and
/// last-seen timestamp in the same transaction so a crash can never leave
/// the two out of step.
pub async fn issue(
    conn: &mut SqliteConnection,
    user: &mut User,
    fingerprint_hash: Option<String>,
    meta: &RequestMeta,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> Result<UserSession> {
    let device_info = meta
        .user_agent
        .as_deref()
        .map(DeviceInfo::from_user_agent);

    let session = UserSession {
        id: uuid::Uuid::new_v4(),
        user_id: user.id,
        session_token: tokens::generate_session_token(),
        fingerprint_hash,
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        device_info,
        started_at: now,
        last_activity_at: now,
        expires_at: now + Duration::hours(ttl_hours),
        is_active: true,
        page_views: 0,
        messages_sent: 0,
        duration_seconds: 0,
        logout_at: None,
        logout_reason: None,
    };

    db::sessions::insert_session(&mut *conn, &session).await?;

    user.total_sessions += 1;
    user.last_seen_at = now;
    user.updated_at = now;
    db::users::update_user(&mut *conn, user).await?;

    debug!(user_id = %user.id, session_id = %session.id, "Issued session");
    Ok(session)
}

/// Validate a session token.
///
/// Returns the session and its user when the token names an active,
/// unexpired session, refreshing `last_activity_at` as a side effect.
/// An expired session is deactivated on sight and treated as a miss.
pub async fn validate(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<(User, UserSession)>> {
    let mut tx = pool.begin().await?;
    let resolved = validate_in(&mut tx, token, now).await?;
    tx.commit().await?;
    Ok(resolved)
}

/// Transaction-level body of [`validate`], reusable by the resolver.
pub async fn validate_in(
    conn: &mut SqliteConnection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<(User, UserSession)>> {
    let Some(mut session) = db::sessions::get_by_token(&mut *conn, token).await? else {
        return Ok(None);
    };
    if !session.is_active {
        return Ok(None);
    }
    if session.is_expired(now) {
        db::sessions::deactivate(&mut *conn, session.id, now, "expired").await?;
        debug!(session_id = %session.id, "Session expired on validation");
        return Ok(None);
    }

    session.last_activity_at = now;
    session.page_views += 1;
    session.duration_seconds = session.elapsed_seconds();
    db::sessions::update_activity(&mut *conn, &session).await?;

    let Some(mut user) = db::users::get_user(&mut *conn, session.user_id).await? else {
        return Ok(None);
    };
    user.last_seen_at = now;
    user.updated_at = now;
    db::users::update_user(&mut *conn, &user).await?;
    Ok(Some((user, session)))
}

/// Explicitly end a session (logout).
///
/// Returns true if this call deactivated the session, false if the token
/// was unknown or the session had already been ended. Safe to repeat.
pub async fn invalidate(pool: &SqlitePool, token: &str, now: DateTime<Utc>) -> Result<bool> {
    let Some(session) = db::sessions::get_by_token(pool, token).await? else {
        return Ok(false);
    };
    let ended = db::sessions::deactivate(pool, session.id, now, "manual").await?;
    if ended {
        info!(session_id = %session.id, user_id = %session.user_id, "Session ended by logout");
    }
    Ok(ended)
}

/// Deactivate all active sessions whose last activity predates the cutoff.
pub async fn sweep_expired(
    pool: &SqlitePool,
    cutoff_hours: i64,
    now: DateTime<Utc>,
) -> Result<u64> {
    let cutoff = now - Duration::hours(cutoff_hours);
    let swept = db::sessions::sweep_inactive(pool, cutoff, now).await?;
    if swept > 0 {
        info!(swept, "Swept inactive sessions");
    }
    Ok(swept)
}
