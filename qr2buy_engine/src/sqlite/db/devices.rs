use log::trace;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Device, DeviceUpdate, ItemStatus, NewDevice},
    traits::{map_unique_violation, StorefrontError},
};

/// Inserts a new device. The external id is trimmed but otherwise stored verbatim (case-sensitive).
/// A duplicate device id is reported as [`StorefrontError::DuplicateDeviceId`].
pub async fn insert_device(device: &NewDevice, conn: &mut SqliteConnection) -> Result<Device, StorefrontError> {
    let device_id = device.device_id.trim();
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO devices (device_id, name, device_secret)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(device_id)
    .bind(device.name.as_ref().map(|n| n.trim().to_string()))
    .bind(device.device_secret.as_deref())
    .fetch_one(conn)
    .await
    .map_err(|e| map_unique_violation(e, || StorefrontError::DuplicateDeviceId(device_id.to_string())))?;
    Ok(inserted)
}

pub async fn device_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Device>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM devices WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn device_by_device_id(
    device_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Device>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM devices WHERE device_id = $1").bind(device_id).fetch_optional(conn).await
}

pub async fn fetch_devices(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Device>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM devices ORDER BY updated_at DESC, id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await
}

/// Fetches the device for the given external id, inserting a fresh record with default state on first contact.
/// Concurrent first contacts are resolved by the unique index: the losing insert falls through to the re-fetch.
pub async fn fetch_or_create_device(
    device_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Device, StorefrontError> {
    let device_id = device_id.trim();
    if let Some(device) = device_by_device_id(device_id, &mut *conn).await? {
        return Ok(device);
    }
    sqlx::query("INSERT INTO devices (device_id) VALUES ($1) ON CONFLICT (device_id) DO NOTHING")
        .bind(device_id)
        .execute(&mut *conn)
        .await?;
    device_by_device_id(device_id, conn)
        .await?
        .ok_or_else(|| StorefrontError::DeviceNotFound(device_id.to_string()))
}

/// Applies a partial update. Returns `None` if the device does not exist.
pub async fn update_device(
    id: i64,
    update: DeviceUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Device>, StorefrontError> {
    if update.is_empty() {
        return device_by_id(id, conn).await.map_err(StorefrontError::from);
    }
    let mut builder = QueryBuilder::new("UPDATE devices SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(name) = update.name {
        set_clause.push("name = ");
        set_clause.push_bind_unseparated(name.trim().to_string());
    }
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(device_secret) = update.device_secret {
        set_clause.push("device_secret = ");
        set_clause.push_bind_unseparated(device_secret);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let result = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Device::from_row(&row)).transpose()?;
    Ok(result)
}

/// Sets the status iff it differs from the current value. See
/// [`super::products::set_product_status`] for the contract.
pub async fn set_device_status(
    id: i64,
    status: ItemStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Device>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE devices SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status <> $1 RETURNING *",
    )
    .bind(status.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Writes the device-side half of the product link. Pass `None` to clear it.
pub async fn set_product_link(
    device_pk: i64,
    product_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Option<Device>, sqlx::Error> {
    sqlx::query_as("UPDATE devices SET product_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(product_id)
        .bind(device_pk)
        .fetch_optional(conn)
        .await
}

/// Stamps `last_seen_at` with the current time. Deliberately leaves `updated_at` alone so that routine polls do not
/// churn the display version token.
pub async fn touch_last_seen(device_id: &str, conn: &mut SqliteConnection) -> Result<Option<Device>, sqlx::Error> {
    sqlx::query_as("UPDATE devices SET last_seen_at = CURRENT_TIMESTAMP WHERE device_id = $1 RETURNING *")
        .bind(device_id)
        .fetch_optional(conn)
        .await
}
