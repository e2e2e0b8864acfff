//! Activity tracking
//!
//! Appends immutable activity records and keeps the session and user
//! counters they imply in step.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use trailmark_common::{Error, Result};

use crate::db;
use crate::models::{ActivityRecord, ActivityType};
use crate::services::session_manager;

/// Record an activity against the session identified by `token`.
///
/// The session must be active and unexpired. Every activity bumps the
/// user's engagement score; `message_sent` additionally bumps the session
/// and user message counters.
pub async fn track(
    pool: &SqlitePool,
    token: &str,
    activity_type: ActivityType,
    conversation_id: Option<String>,
    metadata: Option<serde_json::Value>,
    duration_seconds: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ActivityRecord> {
    let mut tx = pool.begin().await?;

    let Some((mut user, mut session)) =
        session_manager::validate_in(&mut tx, token, now).await?
    else {
        return Err(Error::NotFound("Session not found or inactive".to_string()));
    };

    let mut record = ActivityRecord::new(user.id, activity_type, now);
    record.conversation_id = conversation_id;
    record.metadata = metadata;
    record.duration_seconds = duration_seconds;
    db::activities::insert_activity(&mut *tx, &record).await?;

    user.engagement_score += 1;
    user.last_seen_at = now;
    user.updated_at = now;
    if activity_type == ActivityType::MessageSent {
        user.total_messages += 1;
        session.messages_sent += 1;
        db::sessions::update_activity(&mut *tx, &session).await?;
    }
    db::users::update_user(&mut *tx, &user).await?;

    tx.commit().await?;
    debug!(
        user_id = %user.id,
        activity_type = activity_type.as_str(),
        "Recorded activity"
    );
    Ok(record)
}
