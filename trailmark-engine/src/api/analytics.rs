//! Per-user analytics endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::services::{analytics, journey};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub analytics: analytics::UserAnalytics,
    pub conversion_score: u8,
}

/// GET /api/users/:id/analytics
pub async fn user_analytics(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let now = trailmark_common::time::now();
    let user = db::users::get_user(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", user_id)))?;
    let summary = analytics::user_analytics(&state.db, user_id, now).await?;
    let conversion_score = journey::conversion_score(&user, &summary);

    Ok(Json(AnalyticsResponse {
        analytics: summary,
        conversion_score,
    }))
}
