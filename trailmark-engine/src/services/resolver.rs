//! Recognition resolver
//!
//! Resolves an inbound request to a user via ordered strategies: session
//! token, then fingerprint hash, then device-id fallback, then a fresh
//! anonymous user. Every resolution runs in a single transaction and ends
//! by issuing a new session for the resolved user.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use trailmark_common::{config::EngineSettings, Result};

use crate::db;
use crate::fingerprint::{self, DeviceInfo};
use crate::models::{
    ActivityRecord, ActivityType, JourneyStage, RecognitionMethod, User, UserFingerprint,
    UserType,
};
use crate::services::{journey, session_manager, RequestMeta};

/// Identity evidence carried by one inbound request
#[derive(Debug, Clone, Default)]
pub struct RecognitionInput {
    pub session_token: Option<String>,
    pub fingerprint: Option<Map<String, Value>>,
    pub device_id: Option<String>,
}

/// Outcome of a resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub user: User,
    pub session: crate::models::UserSession,
    pub method: RecognitionMethod,
    pub is_returning: bool,
}

/// Fingerprint payload with its derived hash and match strength
struct PreparedFingerprint<'a> {
    raw: &'a Map<String, Value>,
    hash: String,
    confidence: u8,
}

/// Resolve a request to a user and issue a session for it.
///
/// A lost race (unique-constraint violation, or a write transaction that
/// could not be upgraded because a concurrent resolution held the write
/// lock) rolls the transaction back and retries the whole resolution
/// exactly once, by which point the winner's rows are visible and the
/// retry lands on the match path.
pub async fn resolve(
    pool: &SqlitePool,
    settings: &EngineSettings,
    input: &RecognitionInput,
    meta: &RequestMeta,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    match try_resolve(pool, settings, input, meta, now).await {
        Err(err) if err.is_conflict() => {
            warn!(error = %err, "Resolution lost a uniqueness race, retrying");
            try_resolve(pool, settings, input, meta, now).await
        }
        other => other,
    }
}

async fn try_resolve(
    pool: &SqlitePool,
    settings: &EngineSettings,
    input: &RecognitionInput,
    meta: &RequestMeta,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    let prepared = input.fingerprint.as_ref().map(|raw| PreparedFingerprint {
        raw,
        hash: fingerprint::hash(raw),
        confidence: fingerprint::confidence(raw),
    });

    let mut tx = pool.begin().await?;

    // 1. Session token: the strongest credential. If both a token and a
    // fingerprint are supplied, the token decides identity and the
    // fingerprint is recorded against the token's user.
    if let Some(token) = input.session_token.as_deref() {
        if let Some((mut user, _)) = session_manager::validate_in(&mut tx, token, now).await? {
            if let Some(fp) = &prepared {
                observe_fingerprint(&mut tx, user.id, fp, now).await?;
            }
            let is_returning = user.user_type != UserType::Anonymous;
            let resolution = finish(
                &mut tx,
                &mut user,
                prepared.as_ref(),
                meta,
                settings,
                RecognitionMethod::SessionToken,
                is_returning,
                false,
                now,
            )
            .await?;
            tx.commit().await?;
            return Ok(resolution);
        }
    }

    // 2. Fingerprint hash match, gated on match strength.
    if let Some(fp) = &prepared {
        if i64::from(fp.confidence) >= settings.fingerprint_confidence_threshold {
            if let Some(existing) = db::fingerprints::get_by_hash(&mut *tx, &fp.hash).await? {
                if let Some(mut user) = db::users::get_user(&mut *tx, existing.user_id).await? {
                    record_observation(&mut tx, existing, now).await?;
                    promote_recognized(&mut tx, &mut user, now).await?;
                    let resolution = finish(
                        &mut tx,
                        &mut user,
                        prepared.as_ref(),
                        meta,
                        settings,
                        RecognitionMethod::Fingerprint,
                        true,
                        false,
                        now,
                    )
                    .await?;
                    tx.commit().await?;
                    return Ok(resolution);
                }
            }
        }
    }

    // 3. Device-id fallback: most recently seen anonymous user on that
    // device inherits the fingerprint.
    if let Some(device_id) = input.device_id.as_deref() {
        if let Some(mut user) =
            db::users::latest_anonymous_by_device(&mut *tx, device_id).await?
        {
            if let Some(fp) = &prepared {
                observe_fingerprint(&mut tx, user.id, fp, now).await?;
            }
            promote_recognized(&mut tx, &mut user, now).await?;
            let resolution = finish(
                &mut tx,
                &mut user,
                prepared.as_ref(),
                meta,
                settings,
                RecognitionMethod::Fingerprint,
                true,
                false,
                now,
            )
            .await?;
            tx.commit().await?;
            return Ok(resolution);
        }
    }

    // 4. Nothing matched: new anonymous user in the initial journey state.
    let mut user = User::new_anonymous(input.device_id.clone(), now);
    db::users::insert_user(&mut *tx, &user).await?;
    if let Some(fp) = &prepared {
        // Stored even below the match threshold so later visits can build
        // up the observation history.
        insert_observation(&mut tx, user.id, fp, now).await?;
    }
    let resolution = finish(
        &mut tx,
        &mut user,
        prepared.as_ref(),
        meta,
        settings,
        RecognitionMethod::New,
        false,
        true,
        now,
    )
    .await?;
    tx.commit().await?;
    info!(user_id = %resolution.user.id, "Created new anonymous user");
    Ok(resolution)
}

/// Shared tail of every branch: issue the session, append activities.
#[allow(clippy::too_many_arguments)]
async fn finish(
    conn: &mut SqliteConnection,
    user: &mut User,
    prepared: Option<&PreparedFingerprint<'_>>,
    meta: &RequestMeta,
    settings: &EngineSettings,
    method: RecognitionMethod,
    is_returning: bool,
    is_new_user: bool,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    if is_new_user {
        let first_visit = ActivityRecord::new(user.id, ActivityType::FirstVisit, now);
        db::activities::insert_activity(&mut *conn, &first_visit).await?;
    }

    let session = session_manager::issue(
        conn,
        user,
        prepared.map(|fp| fp.hash.clone()),
        meta,
        settings.session_ttl_hours,
        now,
    )
    .await?;

    let session_start = ActivityRecord::new(user.id, ActivityType::SessionStart, now);
    db::activities::insert_activity(&mut *conn, &session_start).await?;

    info!(
        user_id = %user.id,
        method = method.as_str(),
        is_returning,
        "Resolved request"
    );
    Ok(Resolution {
        user: user.clone(),
        session,
        method,
        is_returning,
    })
}

/// Anonymous users recognized by fingerprint or device become Returning/Engaged.
async fn promote_recognized(
    conn: &mut SqliteConnection,
    user: &mut User,
    now: DateTime<Utc>,
) -> Result<()> {
    if user.user_type == UserType::Anonymous {
        journey::apply_promotion(
            conn,
            user,
            Some(UserType::Returning),
            Some(JourneyStage::Engaged),
            now,
        )
        .await?;
    }
    Ok(())
}

/// Create or update the (user, hash) observation row.
async fn observe_fingerprint(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    fp: &PreparedFingerprint<'_>,
    now: DateTime<Utc>,
) -> Result<()> {
    match db::fingerprints::get_by_user_and_hash(&mut *conn, user_id, &fp.hash).await? {
        Some(existing) => record_observation(conn, existing, now).await,
        None => insert_observation(conn, user_id, fp, now).await,
    }
}

/// Repeat observation: bump times_seen and recompute confidence.
async fn record_observation(
    conn: &mut SqliteConnection,
    mut existing: UserFingerprint,
    now: DateTime<Utc>,
) -> Result<()> {
    existing.update_seen(now);
    existing.recompute_confidence();
    db::fingerprints::update_observation(conn, &existing).await
}

/// First observation of this hash for this user.
async fn insert_observation(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    fp: &PreparedFingerprint<'_>,
    now: DateTime<Utc>,
) -> Result<()> {
    let device = DeviceInfo::from_components(fp.raw);
    let row = UserFingerprint {
        id: Uuid::new_v4(),
        user_id,
        fingerprint_hash: fp.hash.clone(),
        raw_components: Value::Object(fp.raw.clone()),
        browser: Some(device.browser.clone()),
        os: Some(device.os.clone()),
        device_type: Some(device.device_type.clone()),
        screen_resolution: device.screen_resolution.clone(),
        timezone: device.timezone.clone(),
        language: device.language.clone(),
        confidence_score: i64::from(fp.confidence),
        components_count: fp.raw.len() as i64,
        first_seen_at: now,
        last_seen_at: now,
        times_seen: 1,
    };
    db::fingerprints::insert_fingerprint(conn, &row).await
}
