//! Activity tracking endpoint

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ActivityType;
use crate::services::activity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TrackActivityRequest {
    pub session_token: String,
    pub activity_type: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrackActivityResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_type: ActivityType,
    pub created_at: DateTime<Utc>,
}

/// POST /api/activity
pub async fn track_activity(
    State(state): State<AppState>,
    Json(req): Json<TrackActivityRequest>,
) -> Result<Json<TrackActivityResponse>, ApiError> {
    let activity_type = ActivityType::parse(&req.activity_type)?;
    let now = trailmark_common::time::now();
    let record = activity::track(
        &state.db,
        &req.session_token,
        activity_type,
        req.conversation_id,
        req.metadata,
        req.duration_seconds,
        now,
    )
    .await?;

    Ok(Json(TrackActivityResponse {
        id: record.id,
        user_id: record.user_id,
        activity_type: record.activity_type,
        created_at: record.created_at,
    }))
}
