//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by table family:
//! - `orders.rs` - Order lifecycle: create, merge-upsert, corrective and stale status updates
//! - `positions.rs` - Perpetual positions and funding index updates
//! - `blocks.rs` - Blocks, height/time correlation and tendermint events
//! - `reference.rs` - Markets, perpetual markets, assets, liquidity tiers and vaults
//!
//! Every mutating method takes `tx: Option<&mut Tx<'_>>`. With `Some`, the
//! statements join the caller's transaction and nothing is committed here; with
//! `None`, the method opens and commits a transaction of its own.

mod blocks;
mod orders;
mod positions;
mod reference;

pub use blocks::BlockRange;
pub use positions::PositionClose;

use crate::domain::{Decimal, TendermintEventId, TimeMs};
use crate::error::CoreError;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// Transaction handle callers pass to join several writes into one unit.
pub type Tx<'c> = sqlx::Transaction<'c, Sqlite>;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction that callers thread through several mutating calls.
    pub async fn begin(&self) -> Result<Tx<'static>, CoreError> {
        Ok(self.pool.begin().await?)
    }
}

// =========================================================================
// Column decoding
// =========================================================================

fn decimal_column(row: &SqliteRow, column: &'static str) -> Result<Decimal, CoreError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|_| CoreError::invalid(column, raw))
}

fn optional_decimal_column(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<Decimal>, CoreError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| Decimal::from_str(&raw).map_err(|_| CoreError::invalid(column, raw)))
        .transpose()
}

fn uuid_column(row: &SqliteRow, column: &'static str) -> Result<Uuid, CoreError> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw).map_err(|_| CoreError::invalid(column, raw))
}

fn enum_column<T>(row: &SqliteRow, column: &'static str) -> Result<T, CoreError>
where
    T: FromStr<Err = CoreError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
}

fn u32_column(row: &SqliteRow, column: &'static str) -> Result<u32, CoreError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|_| CoreError::invalid(column, raw))
}

fn optional_u32_column(row: &SqliteRow, column: &'static str) -> Result<Option<u32>, CoreError> {
    let raw: Option<i64> = row.try_get(column)?;
    raw.map(|raw| u32::try_from(raw).map_err(|_| CoreError::invalid(column, raw)))
        .transpose()
}

fn optional_time_column(row: &SqliteRow, column: &'static str) -> Result<Option<TimeMs>, CoreError> {
    let raw: Option<i64> = row.try_get(column)?;
    Ok(raw.map(TimeMs::new))
}

fn event_id_column(row: &SqliteRow, column: &'static str) -> Result<TendermintEventId, CoreError> {
    let raw: Vec<u8> = row.try_get(column)?;
    TendermintEventId::decode(&raw)
}

/// `?, ?, ?` for an `IN (...)` list of `n` binds.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
