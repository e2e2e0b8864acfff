//! Journey history persistence (append-only)

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};
use trailmark_common::{time, Result};
use uuid::Uuid;

use crate::models::{JourneyField, JourneyTransition};

/// Append one transition row
pub async fn append_transition<'e, E>(executor: E, transition: &JourneyTransition) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO journey_history (id, user_id, field, from_value, to_value, changed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(transition.id.to_string())
    .bind(transition.user_id.to_string())
    .bind(transition.field.as_str())
    .bind(&transition.from_value)
    .bind(&transition.to_value)
    .bind(time::to_db(transition.changed_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Ordered journey history for a user, oldest first
pub async fn list_transitions<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<JourneyTransition>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, field, from_value, to_value, changed_at
        FROM journey_history
        WHERE user_id = ?
        ORDER BY changed_at, rowid
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(row_to_transition).collect()
}

fn row_to_transition(row: SqliteRow) -> Result<JourneyTransition> {
    let id: String = row.get("id");
    let user_id: String = row.get("user_id");
    let field: String = row.get("field");
    let changed_at: String = row.get("changed_at");

    Ok(JourneyTransition {
        id: Uuid::parse_str(&id)
            .map_err(|e| trailmark_common::Error::Internal(format!("Invalid id: {}", e)))?,
        user_id: Uuid::parse_str(&user_id)
            .map_err(|e| trailmark_common::Error::Internal(format!("Invalid user id: {}", e)))?,
        field: JourneyField::parse(&field)?,
        from_value: row.get("from_value"),
        to_value: row.get("to_value"),
        changed_at: time::from_db(&changed_at)?,
    })
}
