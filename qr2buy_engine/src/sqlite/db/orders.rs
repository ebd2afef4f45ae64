use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order},
    traits::StorefrontError,
};

/// Inserts or updates the order for the given session id in one atomic statement.
///
/// This is the idempotency boundary that makes the two confirmation paths safe to race: the first writer inserts,
/// every later writer updates the same row with its (latest) fields, and the unique index can never surface a
/// duplicate-key error to either caller.
pub async fn upsert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorefrontError> {
    let result: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (session_id, payment_intent_id, product_id, device_id, status, amount, currency, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (session_id) DO UPDATE SET
                payment_intent_id = excluded.payment_intent_id,
                product_id = excluded.product_id,
                device_id = excluded.device_id,
                status = excluded.status,
                amount = excluded.amount,
                currency = excluded.currency,
                raw = excluded.raw,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(&order.session_id)
    .bind(order.payment_intent_id.as_deref())
    .bind(order.product_id)
    .bind(order.device_id)
    .bind(&order.status)
    .bind(order.amount)
    .bind(&order.currency)
    .bind(Json(order.raw))
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order receipt for session [{}] stored with id {}", result.session_id, result.id);
    Ok(result)
}

pub async fn fetch_order_by_session_id(
    session_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE session_id = $1").bind(session_id).fetch_optional(conn).await
}
