//! Block and tendermint event operations for the repository.
//!
//! Blocks are the only place wall-clock time is correlated with height, so every
//! time-to-height question goes through the `blocks` table.

use crate::domain::{Block, TendermintEventId, TimeMs};
use crate::error::CoreError;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{event_id_column, u32_column, Repository, Tx};

/// Inclusive height range covering a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from_height: u32,
    pub to_height: u32,
}

fn block_from_row(row: &SqliteRow) -> Result<Block, CoreError> {
    Ok(Block {
        block_height: u32_column(row, "block_height")?,
        time: TimeMs::new(row.try_get("time_ms")?),
    })
}

async fn insert_block_in(conn: &mut SqliteConnection, block: &Block) -> Result<(), CoreError> {
    sqlx::query("INSERT INTO blocks (block_height, time_ms) VALUES (?, ?)")
        .bind(block.block_height as i64)
        .bind(block.time.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn insert_tendermint_event_in(
    conn: &mut SqliteConnection,
    id: &TendermintEventId,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO tendermint_events (id, block_height, transaction_index, event_index)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(id.encode().to_vec())
    .bind(id.block_height as i64)
    .bind(id.transaction_index)
    .bind(id.event_index as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Repository {
    pub async fn create_block(&self, block: &Block, tx: Option<&mut Tx<'_>>) -> Result<(), CoreError> {
        match tx {
            Some(tx) => insert_block_in(&mut **tx, block).await,
            None => {
                let mut tx = self.pool.begin().await?;
                insert_block_in(&mut *tx, block).await?;
                tx.commit().await?;
                Ok(())
            }
        }
    }

    pub async fn find_block_by_height(&self, height: u32) -> Result<Option<Block>, CoreError> {
        let row = sqlx::query("SELECT block_height, time_ms FROM blocks WHERE block_height = ?")
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(block_from_row).transpose()
    }

    pub async fn find_latest_block(&self) -> Result<Option<Block>, CoreError> {
        let row = sqlx::query(
            "SELECT block_height, time_ms FROM blocks ORDER BY block_height DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(block_from_row).transpose()
    }

    /// Highest block whose time is at or before `time`.
    pub async fn find_block_height_at_or_before_time(
        &self,
        time: TimeMs,
    ) -> Result<Option<Block>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT block_height, time_ms FROM blocks
            WHERE time_ms <= ?
            ORDER BY block_height DESC
            LIMIT 1
            "#,
        )
        .bind(time.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(block_from_row).transpose()
    }

    /// Heights of the first and last blocks with `from <= time <= to`.
    ///
    /// Returns `None` when no block falls inside the range.
    pub async fn find_block_range_for_time_range(
        &self,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Option<BlockRange>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT MIN(block_height) AS from_height, MAX(block_height) AS to_height
            FROM blocks
            WHERE time_ms >= ? AND time_ms <= ?
            "#,
        )
        .bind(from.as_i64())
        .bind(to.as_i64())
        .fetch_one(&self.pool)
        .await?;

        let from_height: Option<i64> = row.try_get("from_height")?;
        let to_height: Option<i64> = row.try_get("to_height")?;
        match (from_height, to_height) {
            (Some(from_height), Some(to_height)) => Ok(Some(BlockRange {
                from_height: u32::try_from(from_height)
                    .map_err(|_| CoreError::invalid("block height", from_height))?,
                to_height: u32::try_from(to_height)
                    .map_err(|_| CoreError::invalid("block height", to_height))?,
            })),
            _ => Ok(None),
        }
    }

    /// Record a tendermint event. Re-recording the same id is a unique violation.
    pub async fn create_tendermint_event(
        &self,
        id: &TendermintEventId,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<(), CoreError> {
        match tx {
            Some(tx) => insert_tendermint_event_in(&mut **tx, id).await,
            None => {
                let mut tx = self.pool.begin().await?;
                insert_tendermint_event_in(&mut *tx, id).await?;
                tx.commit().await?;
                Ok(())
            }
        }
    }

    /// Every recorded event, in chain order (raw id byte order).
    pub async fn find_all_tendermint_events(&self) -> Result<Vec<TendermintEventId>, CoreError> {
        let rows = sqlx::query("SELECT id FROM tendermint_events ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| event_id_column(row, "id")).collect()
    }
}
