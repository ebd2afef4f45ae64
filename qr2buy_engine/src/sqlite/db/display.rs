use sqlx::SqliteConnection;

use crate::{db_types::DisplayState, traits::StorefrontError};

/// Fetches the legacy single-row display state, creating the default row on first access.
pub async fn fetch_display_state(conn: &mut SqliteConnection) -> Result<DisplayState, StorefrontError> {
    if let Some(state) = select_display_state(&mut *conn).await? {
        return Ok(state);
    }
    sqlx::query("INSERT INTO display_state (id) VALUES (1) ON CONFLICT (id) DO NOTHING").execute(&mut *conn).await?;
    select_display_state(conn)
        .await?
        .ok_or_else(|| StorefrontError::DatabaseError("display_state row missing after insert".to_string()))
}

async fn select_display_state(conn: &mut SqliteConnection) -> Result<Option<DisplayState>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM display_state WHERE id = 1").fetch_optional(conn).await
}

/// Replaces the legacy display state with the given fields.
pub async fn update_display_state(
    text: &str,
    qr: &str,
    version: i64,
    conn: &mut SqliteConnection,
) -> Result<DisplayState, StorefrontError> {
    let state = sqlx::query_as(
        r#"
            INSERT INTO display_state (id, text, qr, version, updated_at)
            VALUES (1, $1, $2, $3, CURRENT_TIMESTAMP)
            ON CONFLICT (id) DO UPDATE SET
                text = excluded.text,
                qr = excluded.qr,
                version = excluded.version,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(text)
    .bind(qr)
    .bind(version)
    .fetch_one(conn)
    .await?;
    Ok(state)
}
