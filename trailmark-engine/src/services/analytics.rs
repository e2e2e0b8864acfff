//! Per-user analytics aggregation
//!
//! Pure reads over the user's sessions, activities, and fingerprints.
//! Users with no history get a zeroed summary rather than an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use trailmark_common::{Error, Result};

use crate::db;
use crate::models::{JourneyStage, User, UserType};

/// Aggregated view of a user's history
#[derive(Debug, Clone, Serialize)]
pub struct UserAnalytics {
    pub user_id: Uuid,
    pub user_type: UserType,
    pub journey_stage: JourneyStage,
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_session_seconds: i64,
    pub avg_session_seconds: f64,
    pub total_messages: i64,
    pub total_activities: i64,
    pub conversation_count: i64,
    pub fingerprint_count: i64,
    pub engagement_score: i64,
    pub has_multiple_sessions: bool,
    pub has_conversations: bool,
    pub days_since_first_visit: i64,
    /// Sessions per day since first visit
    pub session_frequency: f64,
    pub engagement_trend: String,
    pub first_visit_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl UserAnalytics {
    /// Summary for a user with no recorded history
    pub fn zeroed(user: &User) -> Self {
        Self {
            user_id: user.id,
            user_type: user.user_type,
            journey_stage: user.journey_stage,
            total_sessions: 0,
            active_sessions: 0,
            total_session_seconds: 0,
            avg_session_seconds: 0.0,
            total_messages: 0,
            total_activities: 0,
            conversation_count: 0,
            fingerprint_count: 0,
            engagement_score: user.engagement_score,
            has_multiple_sessions: false,
            has_conversations: false,
            days_since_first_visit: 0,
            session_frequency: 0.0,
            engagement_trend: "insufficient_data".to_string(),
            first_visit_at: user.first_visit_at,
            last_seen_at: user.last_seen_at,
        }
    }
}

/// Build the analytics summary for a user.
///
/// Errors with `Error::NotFound` for an unknown user id; a known user with
/// no sessions or activities yields a zeroed summary.
pub async fn user_analytics(
    pool: &SqlitePool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<UserAnalytics> {
    let user = db::users::get_user(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", user_id)))?;

    let sessions = db::sessions::list_for_user(pool, user_id, false).await?;
    let stats = db::activities::stats_for_user(pool, user_id).await?;
    let fingerprint_count = db::fingerprints::count_for_user(pool, user_id).await?;

    let mut summary = UserAnalytics::zeroed(&user);
    summary.total_sessions = sessions.len() as i64;
    summary.active_sessions = sessions.iter().filter(|s| s.is_active).count() as i64;
    summary.total_messages = user.total_messages;
    summary.total_activities = stats.total;
    summary.conversation_count = stats.with_conversation;
    summary.fingerprint_count = fingerprint_count;
    summary.has_multiple_sessions = summary.total_sessions > 1;
    summary.has_conversations = stats.with_conversation > 0;
    summary.days_since_first_visit = (now - user.first_visit_at).num_days().max(0);

    // Ended sessions carry a frozen duration; active ones are measured live.
    summary.total_session_seconds = sessions
        .iter()
        .map(|s| if s.is_active { s.elapsed_seconds() } else { s.duration_seconds })
        .sum();
    if summary.total_sessions > 0 {
        summary.avg_session_seconds =
            summary.total_session_seconds as f64 / summary.total_sessions as f64;
    }

    let active_days = summary.days_since_first_visit.max(1);
    if summary.total_sessions > 0 {
        summary.session_frequency = summary.total_sessions as f64 / active_days as f64;
    }

    // list_for_user returns most-recent-first. A session counts as engaged
    // when the user sent messages in it, whether or not it has since ended.
    summary.engagement_trend = engagement_trend(
        sessions
            .iter()
            .take(5)
            .map(|s| s.messages_sent > 0)
            .collect::<Vec<_>>()
            .as_slice(),
    )
    .to_string();

    Ok(summary)
}

/// Label the engagement trend from per-session messaged flags of the most
/// recent sessions, newest first.
fn engagement_trend(recent_messaged: &[bool]) -> &'static str {
    if recent_messaged.len() < 2 {
        return "insufficient_data";
    }
    let engaged = recent_messaged.iter().filter(|m| **m).count() as f64;
    let ratio = engaged / recent_messaged.len() as f64;
    if ratio >= 0.8 {
        "highly_engaged"
    } else if ratio >= 0.5 {
        "moderately_engaged"
    } else if ratio >= 0.2 {
        "low_engagement"
    } else {
        "at_risk"
    }
}
