//! Append-only analytics events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trailmark_common::{Error, Result};
use uuid::Uuid;

/// Trackable activity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    FirstVisit,
    ChatStart,
    MessageSent,
    FeedbackGiven,
    Registration,
    Login,
    SessionStart,
    SessionEnd,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::FirstVisit => "first_visit",
            ActivityType::ChatStart => "chat_start",
            ActivityType::MessageSent => "message_sent",
            ActivityType::FeedbackGiven => "feedback_given",
            ActivityType::Registration => "registration",
            ActivityType::Login => "login",
            ActivityType::SessionStart => "session_start",
            ActivityType::SessionEnd => "session_end",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "first_visit" => Ok(ActivityType::FirstVisit),
            "chat_start" => Ok(ActivityType::ChatStart),
            "message_sent" => Ok(ActivityType::MessageSent),
            "feedback_given" => Ok(ActivityType::FeedbackGiven),
            "registration" => Ok(ActivityType::Registration),
            "login" => Ok(ActivityType::Login),
            "session_start" => Ok(ActivityType::SessionStart),
            "session_end" => Ok(ActivityType::SessionEnd),
            other => Err(Error::InvalidInput(format!("Unknown activity type: {}", other))),
        }
    }
}

/// One analytics event. Never mutated or deleted once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub conversation_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(user_id: Uuid, activity_type: ActivityType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            activity_type,
            conversation_id: None,
            metadata: None,
            duration_seconds: None,
            created_at: now,
        }
    }
}
