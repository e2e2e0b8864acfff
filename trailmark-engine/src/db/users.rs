//! User persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use trailmark_common::{time, Result};
use uuid::Uuid;

use crate::models::{JourneyStage, User, UserType};

/// Insert a freshly created user
pub async fn insert_user<'e, E>(executor: E, user: &User) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, password_hash, password_salt, name,
            user_type, journey_stage, device_id,
            total_sessions, total_messages, engagement_score,
            first_visit_at, last_seen_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.password_salt)
    .bind(&user.name)
    .bind(user.user_type.as_str())
    .bind(user.journey_stage.as_str())
    .bind(&user.device_id)
    .bind(user.total_sessions)
    .bind(user.total_messages)
    .bind(user.engagement_score)
    .bind(time::to_db(user.first_visit_at))
    .bind(time::to_db(user.last_seen_at))
    .bind(time::to_db(user.created_at))
    .bind(time::to_db(user.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Persist all mutable fields of a user
pub async fn update_user<'e, E>(executor: E, user: &User) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE users SET
            email = ?, password_hash = ?, password_salt = ?, name = ?,
            user_type = ?, journey_stage = ?, device_id = ?,
            total_sessions = ?, total_messages = ?, engagement_score = ?,
            last_seen_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.password_salt)
    .bind(&user.name)
    .bind(user.user_type.as_str())
    .bind(user.journey_stage.as_str())
    .bind(&user.device_id)
    .bind(user.total_sessions)
    .bind(user.total_messages)
    .bind(user.engagement_score)
    .bind(time::to_db(user.last_seen_at))
    .bind(time::to_db(user.updated_at))
    .bind(user.id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

/// Point lookup by id
pub async fn get_user<'e, E>(executor: E, id: Uuid) -> Result<Option<User>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_USER))
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.map(row_to_user).transpose()
}

/// Indexed lookup by email (unique once set)
pub async fn get_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("{} WHERE email = ?", SELECT_USER))
        .bind(email)
        .fetch_optional(executor)
        .await?;

    row.map(row_to_user).transpose()
}

/// Device-id fallback: the most recently active anonymous user previously
/// associated with this device id.
pub async fn latest_anonymous_by_device<'e, E>(
    executor: E,
    device_id: &str,
) -> Result<Option<User>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "{} WHERE device_id = ? AND user_type = 'anonymous' ORDER BY last_seen_at DESC LIMIT 1",
        SELECT_USER
    ))
    .bind(device_id)
    .fetch_optional(executor)
    .await?;

    row.map(row_to_user).transpose()
}

const SELECT_USER: &str = r#"
    SELECT id, email, password_hash, password_salt, name,
           user_type, journey_stage, device_id,
           total_sessions, total_messages, engagement_score,
           first_visit_at, last_seen_at, created_at, updated_at
    FROM users
"#;

fn row_to_user(row: SqliteRow) -> Result<User> {
    let id: String = row.get("id");
    let user_type: String = row.get("user_type");
    let journey_stage: String = row.get("journey_stage");
    let first_visit_at: String = row.get("first_visit_at");
    let last_seen_at: String = row.get("last_seen_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| trailmark_common::Error::Internal(format!("Invalid user id: {}", e)))?,
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        password_salt: row.get("password_salt"),
        name: row.get("name"),
        user_type: UserType::parse(&user_type)?,
        journey_stage: JourneyStage::parse(&journey_stage)?,
        device_id: row.get("device_id"),
        total_sessions: row.get("total_sessions"),
        total_messages: row.get("total_messages"),
        engagement_score: row.get("engagement_score"),
        first_visit_at: time::from_db(&first_visit_at)?,
        last_seen_at: time::from_db(&last_seen_at)?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}
