//! Recognition endpoint
//!
//! POST /api/recognize: resolve optional session token, fingerprint
//! payload, and device id to a user, issuing a fresh session.

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{SessionSummary, UserSummary};
use crate::error::ApiError;
use crate::models::RecognitionMethod;
use crate::services::resolver::{self, RecognitionInput};
use crate::services::RequestMeta;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<FingerprintPayload>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Raw fingerprint attributes collected by the client
#[derive(Debug, Deserialize)]
pub struct FingerprintPayload {
    pub components: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub user: UserSummary,
    pub session: SessionSummary,
    pub recognition_method: RecognitionMethod,
    pub is_returning: bool,
}

/// POST /api/recognize
pub async fn recognize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecognizeRequest>,
) -> Result<Json<RecognizeResponse>, ApiError> {
    let user_agent = req.user_agent.or_else(|| {
        headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });
    let meta = RequestMeta {
        ip_address: req.ip_address,
        user_agent,
    };
    let input = RecognitionInput {
        session_token: req.session_token,
        fingerprint: req.fingerprint.map(|fp| fp.components),
        device_id: req.device_id,
    };

    let now = trailmark_common::time::now();
    let resolution = resolver::resolve(&state.db, &state.settings, &input, &meta, now).await?;

    Ok(Json(RecognizeResponse {
        user: UserSummary::from(&resolution.user),
        session: SessionSummary::from(&resolution.session),
        recognition_method: resolution.method,
        is_returning: resolution.is_returning,
    }))
}
