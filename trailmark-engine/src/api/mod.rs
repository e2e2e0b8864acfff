//! HTTP API handlers
//!
//! Thin transport layer over the services; all domain rules live below.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{JourneyStage, User, UserSession, UserType};

pub mod activity;
pub mod analytics;
pub mod auth;
pub mod health;
pub mod recognize;

/// User fields exposed over the wire
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub user_type: UserType,
    pub journey_stage: JourneyStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub total_sessions: i64,
    pub total_messages: i64,
    pub engagement_score: i64,
    pub first_visit_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_type: user.user_type,
            journey_stage: user.journey_stage,
            email: user.email.clone(),
            name: user.name.clone(),
            total_sessions: user.total_sessions,
            total_messages: user.total_messages,
            engagement_score: user.engagement_score,
            first_visit_at: user.first_visit_at,
            last_seen_at: user.last_seen_at,
            created_at: user.created_at,
        }
    }
}

/// Session fields exposed over the wire
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub session_token: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub page_views: i64,
    pub messages_sent: i64,
}

impl From<&UserSession> for SessionSummary {
    fn from(session: &UserSession) -> Self {
        Self {
            id: session.id,
            session_token: session.session_token.clone(),
            started_at: session.started_at,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            is_active: session.is_active,
            page_views: session.page_views,
            messages_sent: session.messages_sent,
        }
    }
}
