//! Registration, login, and logout endpoints

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{SessionSummary, UserSummary};
use crate::db;
use crate::error::ApiError;
use crate::models::{ActivityRecord, ActivityType, User};
use crate::services::{journey, session_manager, tokens, RequestMeta};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Existing anonymous user to convert in place
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserSummary,
    pub session: SessionSummary,
}

/// POST /api/register
///
/// Registers a new account, or converts the anonymous user named by
/// `user_id` in place. Taken email addresses and already-registered
/// users are rejected without mutation.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let now = trailmark_common::time::now();
    let meta = meta_from_headers(&headers);
    let mut tx = state.db.begin().await.map_err(trailmark_common::Error::from)?;

    let mut user = match req.user_id {
        Some(id) => db::users::get_user(&mut *tx, id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?,
        None => {
            let user = User::new_anonymous(None, now);
            db::users::insert_user(&mut *tx, &user).await?;
            user
        }
    };

    journey::promote_to_registered(&mut tx, &mut user, email, &req.password, req.name.as_deref(), now)
        .await?;
    let session = session_manager::issue(
        &mut tx,
        &mut user,
        None,
        &meta,
        state.settings.session_ttl_hours,
        now,
    )
    .await?;
    tx.commit().await.map_err(trailmark_common::Error::from)?;

    let access_token = tokens::sign_access_token(
        user.id,
        state.settings.access_token_ttl_days,
        &state.settings.access_token_secret,
        now,
    );

    Ok(Json(AuthResponse {
        access_token,
        user: UserSummary::from(&user),
        session: SessionSummary::from(&session),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/login
///
/// Bad credentials are rejected with a single undetailed message so the
/// response does not reveal whether the email exists.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let rejected = || ApiError::Unauthorized("Invalid email or password".to_string());

    let now = trailmark_common::time::now();
    let mut user = db::users::get_user_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(rejected)?;
    let (Some(hash), Some(salt)) = (user.password_hash.clone(), user.password_salt.clone())
    else {
        return Err(rejected());
    };
    if !tokens::verify_password(&req.password, &salt, &hash) {
        return Err(rejected());
    }

    let meta = meta_from_headers(&headers);
    let mut tx = state.db.begin().await.map_err(trailmark_common::Error::from)?;
    let session = session_manager::issue(
        &mut tx,
        &mut user,
        None,
        &meta,
        state.settings.session_ttl_hours,
        now,
    )
    .await?;
    let activity = ActivityRecord::new(user.id, ActivityType::Login, now);
    db::activities::insert_activity(&mut *tx, &activity).await?;
    tx.commit().await.map_err(trailmark_common::Error::from)?;

    let access_token = tokens::sign_access_token(
        user.id,
        state.settings.access_token_ttl_days,
        &state.settings.access_token_secret,
        now,
    );

    Ok(Json(AuthResponse {
        access_token,
        user: UserSummary::from(&user),
        session: SessionSummary::from(&session),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// POST /api/logout
///
/// Idempotent: a second logout of the same token returns success=false.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let now = trailmark_common::time::now();
    let success = session_manager::invalidate(&state.db, &req.session_token, now).await?;
    Ok(Json(LogoutResponse { success }))
}

fn meta_from_headers(headers: &HeaderMap) -> RequestMeta {
    RequestMeta {
        ip_address: None,
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}
