//! Perpetual position and funding index operations for the repository.

use crate::domain::{
    Decimal, FundingIndexMap, FundingIndexUpdate, PerpetualPosition, PositionStatus,
    PositionUpdate, TendermintEventId, TimeMs,
};
use crate::error::CoreError;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

use super::{
    decimal_column, enum_column, event_id_column, optional_decimal_column, optional_time_column,
    optional_u32_column, u32_column, uuid_column, Repository, Tx,
};

const POSITION_COLUMNS: &str = r#"
    id, subaccount_id, perpetual_id, side, status, size, max_size, entry_price, exit_price,
    sum_open, sum_close, settled_funding, created_at, created_at_height, closed_at,
    closed_at_height, open_event_id, last_event_id
"#;

fn position_from_row(row: &SqliteRow) -> Result<PerpetualPosition, CoreError> {
    Ok(PerpetualPosition {
        id: uuid_column(row, "id")?,
        subaccount_id: uuid_column(row, "subaccount_id")?,
        perpetual_id: row.try_get("perpetual_id")?,
        side: enum_column(row, "side")?,
        status: enum_column(row, "status")?,
        size: decimal_column(row, "size")?,
        max_size: decimal_column(row, "max_size")?,
        entry_price: decimal_column(row, "entry_price")?,
        exit_price: optional_decimal_column(row, "exit_price")?,
        sum_open: decimal_column(row, "sum_open")?,
        sum_close: decimal_column(row, "sum_close")?,
        settled_funding: decimal_column(row, "settled_funding")?,
        created_at: TimeMs::new(row.try_get("created_at")?),
        created_at_height: u32_column(row, "created_at_height")?,
        closed_at: optional_time_column(row, "closed_at")?,
        closed_at_height: optional_u32_column(row, "closed_at_height")?,
        open_event_id: event_id_column(row, "open_event_id")?,
        last_event_id: event_id_column(row, "last_event_id")?,
    })
}

async fn find_position_in(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<PerpetualPosition, CoreError> {
    let row = sqlx::query(&format!(
        "SELECT {POSITION_COLUMNS} FROM perpetual_positions WHERE id = ?"
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => position_from_row(&row),
        None => Err(CoreError::not_found("perpetual position", id)),
    }
}

async fn insert_position_in(
    conn: &mut SqliteConnection,
    position: &PerpetualPosition,
) -> Result<(), CoreError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO perpetual_positions ({POSITION_COLUMNS})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    ))
    .bind(position.id.to_string())
    .bind(position.subaccount_id.to_string())
    .bind(position.perpetual_id)
    .bind(position.side.as_str())
    .bind(position.status.as_str())
    .bind(position.size.to_canonical_string())
    .bind(position.max_size.to_canonical_string())
    .bind(position.entry_price.to_canonical_string())
    .bind(position.exit_price.map(|p| p.to_canonical_string()))
    .bind(position.sum_open.to_canonical_string())
    .bind(position.sum_close.to_canonical_string())
    .bind(position.settled_funding.to_canonical_string())
    .bind(position.created_at.as_i64())
    .bind(position.created_at_height as i64)
    .bind(position.closed_at.map(|t| t.as_i64()))
    .bind(position.closed_at_height.map(i64::from))
    .bind(position.open_event_id.encode().to_vec())
    .bind(position.last_event_id.encode().to_vec())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Persist the mutable fields of an existing position.
async fn save_position_in(
    conn: &mut SqliteConnection,
    position: &PerpetualPosition,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        UPDATE perpetual_positions SET
            side = ?, status = ?, size = ?, max_size = ?, entry_price = ?, exit_price = ?,
            sum_open = ?, sum_close = ?, settled_funding = ?, closed_at = ?,
            closed_at_height = ?, last_event_id = ?
        WHERE id = ?
        "#,
    )
    .bind(position.side.as_str())
    .bind(position.status.as_str())
    .bind(position.size.to_canonical_string())
    .bind(position.max_size.to_canonical_string())
    .bind(position.entry_price.to_canonical_string())
    .bind(position.exit_price.map(|p| p.to_canonical_string()))
    .bind(position.sum_open.to_canonical_string())
    .bind(position.sum_close.to_canonical_string())
    .bind(position.settled_funding.to_canonical_string())
    .bind(position.closed_at.map(|t| t.as_i64()))
    .bind(position.closed_at_height.map(i64::from))
    .bind(position.last_event_id.encode().to_vec())
    .bind(position.id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_position_in(
    conn: &mut SqliteConnection,
    id: Uuid,
    update: &PositionUpdate,
) -> Result<PerpetualPosition, CoreError> {
    let mut position = find_position_in(conn, id).await?;
    position.apply_update(update)?;
    save_position_in(conn, &position).await?;
    Ok(position)
}

async fn close_position_in(
    conn: &mut SqliteConnection,
    id: Uuid,
    close: &PositionClose,
) -> Result<PerpetualPosition, CoreError> {
    let mut position = find_position_in(conn, id).await?;
    position.close(
        close.exit_price,
        close.closed_at,
        close.closed_at_height,
        close.last_event_id,
    )?;
    save_position_in(conn, &position).await?;
    Ok(position)
}

async fn insert_funding_index_update_in(
    conn: &mut SqliteConnection,
    update: &FundingIndexUpdate,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO funding_index_updates
        (perpetual_id, effective_at_height, funding_index, rate, oracle_price, event_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(update.perpetual_id)
    .bind(update.effective_at_height as i64)
    .bind(update.funding_index.to_canonical_string())
    .bind(update.rate.to_canonical_string())
    .bind(update.oracle_price.to_canonical_string())
    .bind(update.event_id.encode().to_vec())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Terminal fields written when a position's exposure returns to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionClose {
    pub exit_price: Decimal,
    pub closed_at: TimeMs,
    pub closed_at_height: u32,
    pub last_event_id: TendermintEventId,
}

impl Repository {
    /// Insert a new OPEN position.
    ///
    /// # Errors
    /// `Integrity` for a position that is not OPEN; a duplicate id surfaces as
    /// the database's unique violation.
    pub async fn create_perpetual_position(
        &self,
        position: &PerpetualPosition,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<(), CoreError> {
        if position.status != PositionStatus::Open {
            return Err(CoreError::Integrity(format!(
                "perpetual position {} must be created OPEN",
                position.id
            )));
        }
        match tx {
            Some(tx) => insert_position_in(&mut **tx, position).await,
            None => {
                let mut tx = self.pool.begin().await?;
                insert_position_in(&mut *tx, position).await?;
                tx.commit().await?;
                Ok(())
            }
        }
    }

    pub async fn find_perpetual_position_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<PerpetualPosition>, CoreError> {
        let mut conn = self.pool.acquire().await?;
        match find_position_in(&mut *conn, id).await {
            Ok(position) => Ok(Some(position)),
            Err(CoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Apply a fill or funding settlement to an OPEN position.
    ///
    /// # Errors
    /// `NotFound` for an unknown id, `Integrity` when the position is CLOSED.
    pub async fn update_perpetual_position(
        &self,
        id: Uuid,
        update: &PositionUpdate,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<PerpetualPosition, CoreError> {
        match tx {
            Some(tx) => update_position_in(&mut **tx, id, update).await,
            None => {
                let mut tx = self.pool.begin().await?;
                let position = update_position_in(&mut *tx, id, update).await?;
                tx.commit().await?;
                Ok(position)
            }
        }
    }

    /// Close a position: size becomes 0 and the row is never mutated again.
    pub async fn close_perpetual_position(
        &self,
        id: Uuid,
        close: &PositionClose,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<PerpetualPosition, CoreError> {
        let position = match tx {
            Some(tx) => close_position_in(&mut **tx, id, close).await?,
            None => {
                let mut tx = self.pool.begin().await?;
                let position = close_position_in(&mut *tx, id, close).await?;
                tx.commit().await?;
                position
            }
        };
        debug!(position_id = %id, height = close.closed_at_height, "Perpetual position closed");
        Ok(position)
    }

    pub async fn find_open_positions_for_subaccount(
        &self,
        subaccount_id: Uuid,
    ) -> Result<Vec<PerpetualPosition>, CoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {POSITION_COLUMNS} FROM perpetual_positions
            WHERE subaccount_id = ? AND status = ?
            ORDER BY perpetual_id ASC, open_event_id ASC
            "#
        ))
        .bind(subaccount_id.to_string())
        .bind(PositionStatus::Open.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(position_from_row).collect()
    }

    /// Record a funding index. One update per perpetual per height.
    pub async fn insert_funding_index_update(
        &self,
        update: &FundingIndexUpdate,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<(), CoreError> {
        match tx {
            Some(tx) => insert_funding_index_update_in(&mut **tx, update).await,
            None => {
                let mut tx = self.pool.begin().await?;
                insert_funding_index_update_in(&mut *tx, update).await?;
                tx.commit().await?;
                Ok(())
            }
        }
    }

    /// Latest funding index at or before `height` for every perpetual that has one.
    /// Perpetuals without an update read as 0 from the returned map.
    pub async fn find_funding_index_map(&self, height: u32) -> Result<FundingIndexMap, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT f.perpetual_id, f.funding_index
            FROM funding_index_updates f
            JOIN (
                SELECT perpetual_id, MAX(effective_at_height) AS effective_at_height
                FROM funding_index_updates
                WHERE effective_at_height <= ?
                GROUP BY perpetual_id
            ) latest
              ON latest.perpetual_id = f.perpetual_id
             AND latest.effective_at_height = f.effective_at_height
            "#,
        )
        .bind(height as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<(i32, Decimal), CoreError> {
                Ok((row.try_get("perpetual_id")?, decimal_column(row, "funding_index")?))
            })
            .collect()
    }
}
