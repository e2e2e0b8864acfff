//! Activity record persistence (append-only)

use sqlx::{Row, Sqlite};
use trailmark_common::{time, Error, Result};
use uuid::Uuid;

use crate::models::ActivityRecord;

/// Append one activity record
pub async fn insert_activity<'e, E>(executor: E, record: &ActivityRecord) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let metadata = record
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize metadata: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO activity_records (
            id, user_id, activity_type, conversation_id, metadata,
            duration_seconds, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.user_id.to_string())
    .bind(record.activity_type.as_str())
    .bind(&record.conversation_id)
    .bind(metadata)
    .bind(record.duration_seconds)
    .bind(time::to_db(record.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Aggregate counts used by the analytics summary
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivityStats {
    pub total: i64,
    pub with_conversation: i64,
}

/// Count activities (and those tied to a conversation) for a user
pub async fn stats_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<ActivityStats>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(conversation_id) AS with_conversation
        FROM activity_records
        WHERE user_id = ?
        "#,
    )
    .bind(user_id.to_string())
    .fetch_one(executor)
    .await?;

    Ok(ActivityStats {
        total: row.get("total"),
        with_conversation: row.get("with_conversation"),
    })
}
