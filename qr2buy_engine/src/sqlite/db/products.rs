use log::trace;
use q2b_common::DEFAULT_CURRENCY_CODE;
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{ItemStatus, NewProduct, Product, ProductUpdate},
    traits::{map_unique_violation, StorefrontError},
};

/// Inserts a new product. `short_id` must already be normalized (trimmed, lowercase) by the caller.
/// A duplicate short id is reported as [`StorefrontError::DuplicateShortId`].
pub async fn insert_product(
    short_id: &str,
    product: &NewProduct,
    conn: &mut SqliteConnection,
) -> Result<Product, StorefrontError> {
    let currency = product.currency.clone().unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO products (short_id, name, price, currency, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(short_id)
    .bind(product.name.trim())
    .bind(product.price)
    .bind(currency)
    .bind(product.image_url.as_deref())
    .fetch_one(conn)
    .await
    .map_err(|e| map_unique_violation(e, || StorefrontError::DuplicateShortId(short_id.to_string())))?;
    Ok(inserted)
}

pub async fn product_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn product_by_short_id(
    short_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE short_id = $1").bind(short_id).fetch_optional(conn).await
}

pub async fn short_id_exists(short_id: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM products WHERE short_id = $1").bind(short_id).fetch_optional(conn).await?;
    Ok(row.is_some())
}

pub async fn fetch_products(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products ORDER BY created_at DESC, id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await
}

/// Applies a partial update. Returns `None` if the product does not exist.
pub async fn update_product(
    id: i64,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, StorefrontError> {
    if update.is_empty() {
        return product_by_id(id, conn).await.map_err(StorefrontError::from);
    }
    let mut builder = QueryBuilder::new("UPDATE products SET updated_at = CURRENT_TIMESTAMP, ");
    let mut set_clause = builder.separated(", ");
    if let Some(name) = update.name {
        set_clause.push("name = ");
        set_clause.push_bind_unseparated(name.trim().to_string());
    }
    if let Some(price) = update.price {
        set_clause.push("price = ");
        set_clause.push_bind_unseparated(price);
    }
    if let Some(currency) = update.currency {
        set_clause.push("currency = ");
        set_clause.push_bind_unseparated(currency.trim().to_uppercase());
    }
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(image_url) = update.image_url {
        set_clause.push("image_url = ");
        set_clause.push_bind_unseparated(image_url);
    }
    if let Some(stripe_product_id) = update.stripe_product_id {
        set_clause.push("stripe_product_id = ");
        set_clause.push_bind_unseparated(stripe_product_id);
    }
    if let Some(stripe_price_id) = update.stripe_price_id {
        set_clause.push("stripe_price_id = ");
        set_clause.push_bind_unseparated(stripe_price_id);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let result = builder.build().fetch_optional(conn).await?.map(|row: SqliteRow| Product::from_row(&row)).transpose()?;
    Ok(result)
}

/// Sets the status iff it differs from the current value. Returns the updated row, or `None` when the product
/// already had the given status (or does not exist) — the caller distinguishes the two by refetching.
pub async fn set_product_status(
    id: i64,
    status: ItemStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE products SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status <> $1 RETURNING *",
    )
    .bind(status.to_string())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Writes the product-side half of the device link. Pass `None` to clear it.
pub async fn set_device_link(
    product_id: i64,
    device_pk: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("UPDATE products SET device_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(device_pk)
        .bind(product_id)
        .fetch_optional(conn)
        .await
}
