//! Journey state machine
//!
//! Users progress Anonymous → Returning → Registered and
//! FirstVisit → Engaged → Converted. Progression is strictly forward;
//! every change is recorded in the append-only journey history.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use trailmark_common::{Error, Result};

use crate::db;
use crate::models::{JourneyField, JourneyStage, JourneyTransition, User, UserType};
use crate::services::analytics::UserAnalytics;
use crate::services::tokens;

/// Advance the user's journey fields in memory.
///
/// `None` leaves a field untouched; setting a field to its current value
/// produces no transition. Any backward move is rejected with
/// `Error::InvalidState` and the user is left unmodified.
pub fn promote(
    user: &mut User,
    new_type: Option<UserType>,
    new_stage: Option<JourneyStage>,
    now: DateTime<Utc>,
) -> Result<Vec<JourneyTransition>> {
    if let Some(t) = new_type {
        if t < user.user_type {
            return Err(Error::InvalidState(format!(
                "Cannot demote user type {} to {}",
                user.user_type.as_str(),
                t.as_str()
            )));
        }
    }
    if let Some(s) = new_stage {
        if s < user.journey_stage {
            return Err(Error::InvalidState(format!(
                "Cannot demote journey stage {} to {}",
                user.journey_stage.as_str(),
                s.as_str()
            )));
        }
    }

    let mut transitions = Vec::new();
    if let Some(t) = new_type {
        if t != user.user_type {
            transitions.push(JourneyTransition {
                id: Uuid::new_v4(),
                user_id: user.id,
                field: JourneyField::Type,
                from_value: user.user_type.as_str().to_string(),
                to_value: t.as_str().to_string(),
                changed_at: now,
            });
            user.user_type = t;
        }
    }
    if let Some(s) = new_stage {
        if s != user.journey_stage {
            transitions.push(JourneyTransition {
                id: Uuid::new_v4(),
                user_id: user.id,
                field: JourneyField::Stage,
                from_value: user.journey_stage.as_str().to_string(),
                to_value: s.as_str().to_string(),
                changed_at: now,
            });
            user.journey_stage = s;
        }
    }
    if !transitions.is_empty() {
        user.updated_at = now;
    }
    Ok(transitions)
}

/// Advance the journey and persist both the user row and the history
/// entries inside the caller's transaction.
pub async fn apply_promotion(
    conn: &mut SqliteConnection,
    user: &mut User,
    new_type: Option<UserType>,
    new_stage: Option<JourneyStage>,
    now: DateTime<Utc>,
) -> Result<Vec<JourneyTransition>> {
    let transitions = promote(user, new_type, new_stage, now)?;
    if transitions.is_empty() {
        return Ok(transitions);
    }
    db::users::update_user(&mut *conn, user).await?;
    for transition in &transitions {
        db::journey::append_transition(&mut *conn, transition).await?;
    }
    info!(
        user_id = %user.id,
        user_type = user.user_type.as_str(),
        journey_stage = user.journey_stage.as_str(),
        "Journey advanced"
    );
    Ok(transitions)
}

/// Convert a user to Registered/Converted with credentials.
///
/// Rejects already-registered users and taken email addresses with
/// `Error::InvalidState`. Persists the user, the history entries, and a
/// `registration` activity inside the caller's transaction.
pub async fn promote_to_registered(
    conn: &mut SqliteConnection,
    user: &mut User,
    email: &str,
    password: &str,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<JourneyTransition>> {
    if user.user_type == UserType::Registered {
        return Err(Error::InvalidState(
            "User is already registered".to_string(),
        ));
    }
    if let Some(existing) = db::users::get_user_by_email(&mut *conn, email).await? {
        if existing.id != user.id {
            return Err(Error::InvalidState(format!(
                "Email {} is already registered",
                email
            )));
        }
    }

    let salt = tokens::generate_salt();
    user.email = Some(email.to_string());
    user.password_salt = Some(salt.clone());
    user.password_hash = Some(tokens::hash_password(password, &salt));
    if let Some(name) = name {
        user.name = Some(name.to_string());
    }

    let transitions = apply_promotion(
        conn,
        user,
        Some(UserType::Registered),
        Some(JourneyStage::Converted),
        now,
    )
    .await?;

    let activity = crate::models::ActivityRecord::new(
        user.id,
        crate::models::ActivityType::Registration,
        now,
    );
    db::activities::insert_activity(&mut *conn, &activity).await?;

    Ok(transitions)
}

/// Score how far along the conversion funnel a user is, 0-100.
pub fn conversion_score(user: &User, analytics: &UserAnalytics) -> u8 {
    let type_base: i64 = match user.user_type {
        UserType::Anonymous => 0,
        UserType::Returning => 30,
        UserType::Registered => 100,
    };
    let stage_bonus: i64 = match user.journey_stage {
        JourneyStage::FirstVisit => 0,
        JourneyStage::Engaged => 20,
        JourneyStage::Converted => 50,
    };
    let mut score = (type_base + stage_bonus).min(100);
    if analytics.has_multiple_sessions {
        score += 20;
    }
    if analytics.has_conversations {
        score += 15;
    }
    // +2 per active day since first visit, capped at +15
    score += (analytics.days_since_first_visit * 2).min(15);
    score.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analytics::UserAnalytics;
    use chrono::TimeZone;

    fn anon_user() -> User {
        User::new_anonymous(None, Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
    }

    fn empty_analytics(user: &User) -> UserAnalytics {
        UserAnalytics::zeroed(user)
    }

    #[test]
    fn promote_records_one_transition_per_changed_field() {
        let mut user = anon_user();
        let now = user.created_at + chrono::Duration::hours(1);
        let transitions = promote(
            &mut user,
            Some(UserType::Returning),
            Some(JourneyStage::Engaged),
            now,
        )
        .unwrap();
        assert_eq!(transitions.len(), 2);
        assert_eq!(user.user_type, UserType::Returning);
        assert_eq!(user.journey_stage, JourneyStage::Engaged);
        assert_eq!(transitions[0].from_value, "anonymous");
        assert_eq!(transitions[0].to_value, "returning");
        assert_eq!(transitions[1].from_value, "first_visit");
        assert_eq!(transitions[1].to_value, "engaged");
    }

    #[test]
    fn promote_same_value_is_a_no_op() {
        let mut user = anon_user();
        let before = user.updated_at;
        let transitions = promote(
            &mut user,
            Some(UserType::Anonymous),
            Some(JourneyStage::FirstVisit),
            before + chrono::Duration::hours(1),
        )
        .unwrap();
        assert!(transitions.is_empty());
        assert_eq!(user.updated_at, before);
    }

    #[test]
    fn promote_rejects_backward_moves() {
        let mut user = anon_user();
        let now = user.created_at;
        promote(&mut user, Some(UserType::Registered), None, now).unwrap();
        let err = promote(&mut user, Some(UserType::Returning), None, now).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(user.user_type, UserType::Registered);
    }

    #[test]
    fn promote_rejects_stage_regression_without_mutating_type() {
        let mut user = anon_user();
        let now = user.created_at;
        promote(&mut user, None, Some(JourneyStage::Converted), now).unwrap();
        let err = promote(
            &mut user,
            Some(UserType::Returning),
            Some(JourneyStage::Engaged),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(user.user_type, UserType::Anonymous);
        assert_eq!(user.journey_stage, JourneyStage::Converted);
    }

    #[test]
    fn conversion_score_fresh_anonymous_is_zero() {
        let user = anon_user();
        let analytics = empty_analytics(&user);
        assert_eq!(conversion_score(&user, &analytics), 0);
    }

    #[test]
    fn conversion_score_returning_engaged_with_history() {
        let mut user = anon_user();
        user.user_type = UserType::Returning;
        user.journey_stage = JourneyStage::Engaged;
        let mut analytics = empty_analytics(&user);
        analytics.has_multiple_sessions = true;
        analytics.has_conversations = true;
        analytics.days_since_first_visit = 3;
        // 30 + 20 + 20 + 15 + 6
        assert_eq!(conversion_score(&user, &analytics), 91);
    }

    #[test]
    fn conversion_score_caps_at_100() {
        let mut user = anon_user();
        user.user_type = UserType::Registered;
        user.journey_stage = JourneyStage::Converted;
        let mut analytics = empty_analytics(&user);
        analytics.has_multiple_sessions = true;
        analytics.has_conversations = true;
        analytics.days_since_first_visit = 400;
        assert_eq!(conversion_score(&user, &analytics), 100);
    }

    #[test]
    fn conversion_score_recency_accrues_per_day() {
        let mut user = anon_user();
        user.user_type = UserType::Returning;
        let mut analytics = empty_analytics(&user);
        analytics.days_since_first_visit = 0;
        assert_eq!(conversion_score(&user, &analytics), 30);
        analytics.days_since_first_visit = 1;
        assert_eq!(conversion_score(&user, &analytics), 32);
        analytics.days_since_first_visit = 2;
        assert_eq!(conversion_score(&user, &analytics), 34);
        // Cap at +15
        analytics.days_since_first_visit = 30;
        assert_eq!(conversion_score(&user, &analytics), 45);
    }
}
