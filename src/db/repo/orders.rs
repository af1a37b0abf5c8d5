//! Order lifecycle operations for the repository.

use crate::domain::order::merge;
use crate::domain::{Order, OrderFlags, OrderStatus, OrderUpsert, TimeMs};
use crate::error::CoreError;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::{
    decimal_column, enum_column, optional_decimal_column, optional_time_column,
    optional_u32_column, placeholders, u32_column, uuid_column, Repository, Tx,
};

const ORDER_COLUMNS: &str = r#"
    id, subaccount_id, client_id, clob_pair_id, side, size, total_filled, price, type,
    status, time_in_force, reduce_only, order_flags, good_til_block, good_til_block_time,
    created_at_height, client_metadata, trigger_price, updated_at, updated_at_height
"#;

fn order_from_row(row: &SqliteRow) -> Result<Order, CoreError> {
    Ok(Order {
        id: uuid_column(row, "id")?,
        subaccount_id: uuid_column(row, "subaccount_id")?,
        client_id: u32_column(row, "client_id")?,
        clob_pair_id: row.try_get("clob_pair_id")?,
        side: enum_column(row, "side")?,
        size: decimal_column(row, "size")?,
        total_filled: decimal_column(row, "total_filled")?,
        price: decimal_column(row, "price")?,
        order_type: enum_column(row, "type")?,
        status: enum_column(row, "status")?,
        time_in_force: enum_column(row, "time_in_force")?,
        reduce_only: row.try_get::<i64, _>("reduce_only")? != 0,
        order_flags: OrderFlags(u32_column(row, "order_flags")?),
        good_til_block: optional_u32_column(row, "good_til_block")?,
        good_til_block_time: optional_time_column(row, "good_til_block_time")?,
        created_at_height: optional_u32_column(row, "created_at_height")?,
        client_metadata: u32_column(row, "client_metadata")?,
        trigger_price: optional_decimal_column(row, "trigger_price")?,
        updated_at: TimeMs::new(row.try_get("updated_at")?),
        updated_at_height: u32_column(row, "updated_at_height")?,
    })
}

fn orders_from_rows(rows: &[SqliteRow]) -> Result<Vec<Order>, CoreError> {
    rows.iter().map(order_from_row).collect()
}

async fn find_order_in(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Order>, CoreError> {
    let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(order_from_row).transpose()
}

/// Insert or fully overwrite the row for `order.id`.
async fn write_order(conn: &mut SqliteConnection, order: &Order) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, subaccount_id, client_id, clob_pair_id, side, size, total_filled, price, type,
            status, time_in_force, reduce_only, order_flags, good_til_block, good_til_block_time,
            created_at_height, client_metadata, trigger_price, updated_at, updated_at_height
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            side = excluded.side,
            size = excluded.size,
            total_filled = excluded.total_filled,
            price = excluded.price,
            type = excluded.type,
            status = excluded.status,
            time_in_force = excluded.time_in_force,
            reduce_only = excluded.reduce_only,
            good_til_block = excluded.good_til_block,
            good_til_block_time = excluded.good_til_block_time,
            created_at_height = excluded.created_at_height,
            client_metadata = excluded.client_metadata,
            trigger_price = excluded.trigger_price,
            updated_at = excluded.updated_at,
            updated_at_height = excluded.updated_at_height
        "#,
    )
    .bind(order.id.to_string())
    .bind(order.subaccount_id.to_string())
    .bind(order.client_id as i64)
    .bind(order.clob_pair_id)
    .bind(order.side.as_str())
    .bind(order.size.to_canonical_string())
    .bind(order.total_filled.to_canonical_string())
    .bind(order.price.to_canonical_string())
    .bind(order.order_type.as_str())
    .bind(order.status.as_str())
    .bind(order.time_in_force.as_str())
    .bind(order.reduce_only)
    .bind(order.order_flags.bits() as i64)
    .bind(order.good_til_block.map(i64::from))
    .bind(order.good_til_block_time.map(|t| t.as_i64()))
    .bind(order.created_at_height.map(i64::from))
    .bind(order.client_metadata as i64)
    .bind(order.trigger_price.map(|p| p.to_canonical_string()))
    .bind(order.updated_at.as_i64())
    .bind(order.updated_at_height as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn create_order_in(
    conn: &mut SqliteConnection,
    upsert: &OrderUpsert,
) -> Result<Order, CoreError> {
    let id = upsert.id();
    if find_order_in(conn, id).await?.is_some() {
        return Err(CoreError::Integrity(format!("order {} already exists", id)));
    }
    let order = merge(None, upsert)?;
    write_order(conn, &order).await?;
    Ok(order)
}

async fn upsert_order_in(
    conn: &mut SqliteConnection,
    upsert: &OrderUpsert,
) -> Result<Order, CoreError> {
    let existing = find_order_in(conn, upsert.id()).await?;
    let order = merge(existing.as_ref(), upsert)?;
    if let Some(previous) = existing.as_ref().filter(|o| o.status != order.status) {
        debug!(
            order_id = %order.id,
            from = previous.status.as_str(),
            to = order.status.as_str(),
            "Order status changed by upsert"
        );
    }
    write_order(conn, &order).await?;
    Ok(order)
}

async fn update_order_status_in(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: OrderStatus,
) -> Result<Order, CoreError> {
    let row = sqlx::query(&format!(
        "UPDATE orders SET status = ? WHERE id = ? RETURNING {ORDER_COLUMNS}"
    ))
    .bind(status.as_str())
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => order_from_row(&row),
        None => Err(CoreError::not_found("order", id)),
    }
}

/// Ids bound per stale-update statement. SQLite caps host parameters per statement.
const STALE_UPDATE_CHUNK: usize = 500;

async fn update_stale_order_status_in(
    conn: &mut SqliteConnection,
    from: OrderStatus,
    to: OrderStatus,
    latest_height: u32,
    ids: &[Uuid],
) -> Result<Vec<Order>, CoreError> {
    let mut updated = Vec::new();
    for chunk in ids.chunks(STALE_UPDATE_CHUNK) {
        let sql = format!(
            r#"
            UPDATE orders SET status = ?
            WHERE id IN ({})
              AND status = ?
              AND good_til_block IS NOT NULL
              AND good_til_block < ?
            RETURNING {ORDER_COLUMNS}
            "#,
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql).bind(to.as_str());
        for id in chunk {
            query = query.bind(id.to_string());
        }
        let rows = query
            .bind(from.as_str())
            .bind(latest_height as i64)
            .fetch_all(&mut *conn)
            .await?;
        updated.extend(orders_from_rows(&rows)?);
    }
    Ok(updated)
}

impl Repository {
    /// Insert a new order.
    ///
    /// # Errors
    /// `Integrity` when an order with the same id already exists or when the
    /// snapshot does not carry exactly one expiry.
    pub async fn create_order(
        &self,
        upsert: &OrderUpsert,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<Order, CoreError> {
        match tx {
            Some(tx) => create_order_in(&mut **tx, upsert).await,
            None => {
                let mut tx = self.pool.begin().await?;
                let order = create_order_in(&mut *tx, upsert).await?;
                tx.commit().await?;
                Ok(order)
            }
        }
    }

    pub async fn find_order_by_id(&self, id: Uuid) -> Result<Option<Order>, CoreError> {
        let mut conn = self.pool.acquire().await?;
        find_order_in(&mut *conn, id).await
    }

    /// Merge an order snapshot into the stored row, inserting it if absent.
    ///
    /// The stored status is recomputed from the snapshot (see
    /// [`crate::domain::order::resolve_status`]); a stored BEST_EFFORT_CANCELED
    /// is never replaced.
    pub async fn upsert_order(
        &self,
        upsert: &OrderUpsert,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<Order, CoreError> {
        match tx {
            Some(tx) => upsert_order_in(&mut **tx, upsert).await,
            None => {
                let mut tx = self.pool.begin().await?;
                let order = upsert_order_in(&mut *tx, upsert).await?;
                tx.commit().await?;
                Ok(order)
            }
        }
    }

    /// Explicit corrective status write. Unlike an upsert this may move an order
    /// out of a terminal status.
    pub async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<Order, CoreError> {
        match tx {
            Some(tx) => update_order_status_in(&mut **tx, id, status).await,
            None => {
                let mut tx = self.pool.begin().await?;
                let order = update_order_status_in(&mut *tx, id, status).await?;
                tx.commit().await?;
                Ok(order)
            }
        }
    }

    /// Move orders in `ids` from `from` to `to` when they have expired by height.
    ///
    /// Only rows whose status is `from` and whose `good_til_block` is set and
    /// below `latest_height` change. Returns the updated rows.
    pub async fn update_stale_order_status_by_ids(
        &self,
        from: OrderStatus,
        to: OrderStatus,
        latest_height: u32,
        ids: &[Uuid],
        tx: Option<&mut Tx<'_>>,
    ) -> Result<Vec<Order>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let updated = match tx {
            Some(tx) => update_stale_order_status_in(&mut **tx, from, to, latest_height, ids).await?,
            None => {
                let mut tx = self.pool.begin().await?;
                let updated =
                    update_stale_order_status_in(&mut *tx, from, to, latest_height, ids).await?;
                tx.commit().await?;
                updated
            }
        };
        debug!(
            requested = ids.len(),
            updated = updated.len(),
            latest_height,
            from = from.as_str(),
            to = to.as_str(),
            "Stale order statuses updated"
        );
        Ok(updated)
    }

    /// OPEN orders whose flags mark them long-term or conditional.
    pub async fn find_open_long_term_or_conditional_orders(&self) -> Result<Vec<Order>, CoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status = ? AND (order_flags & ?) != 0
            ORDER BY id ASC
            "#
        ))
        .bind(OrderStatus::Open.as_str())
        .bind((OrderFlags::LONG_TERM.bits() | OrderFlags::CONDITIONAL.bits()) as i64)
        .fetch_all(&self.pool)
        .await?;
        orders_from_rows(&rows)
    }

    pub async fn find_by_subaccount_id_and_clob_pair(
        &self,
        subaccount_id: Uuid,
        clob_pair_id: i32,
    ) -> Result<Vec<Order>, CoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE subaccount_id = ? AND clob_pair_id = ?
            ORDER BY client_id ASC, id ASC
            "#
        ))
        .bind(subaccount_id.to_string())
        .bind(clob_pair_id)
        .fetch_all(&self.pool)
        .await?;
        orders_from_rows(&rows)
    }

    /// Orders for the subaccount and book created strictly after `height`.
    pub async fn find_by_subaccount_id_and_clob_pair_after_height(
        &self,
        subaccount_id: Uuid,
        clob_pair_id: i32,
        height: u32,
    ) -> Result<Vec<Order>, CoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE subaccount_id = ? AND clob_pair_id = ? AND created_at_height > ?
            ORDER BY created_at_height ASC, id ASC
            "#
        ))
        .bind(subaccount_id.to_string())
        .bind(clob_pair_id)
        .bind(height as i64)
        .fetch_all(&self.pool)
        .await?;
        orders_from_rows(&rows)
    }
}
