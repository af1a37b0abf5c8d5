//! Reference table writes and full-table scans for the repository.
//!
//! The scans back the in-memory reference caches; each returns every row in
//! primary key order.

use crate::cache::ReferenceSource;
use crate::domain::{Address, Asset, Decimal, LiquidityTier, Market, PerpetualMarket, Vault};
use crate::error::CoreError;
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use super::{enum_column, optional_decimal_column, u32_column, Repository, Tx};

async fn insert_market_in(conn: &mut SqliteConnection, market: &Market) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO markets (id, pair, exponent, min_price_change_ppm, oracle_price)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(market.id)
    .bind(&market.pair)
    .bind(market.exponent)
    .bind(market.min_price_change_ppm as i64)
    .bind(market.oracle_price.map(|p| p.to_canonical_string()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_oracle_price_in(
    conn: &mut SqliteConnection,
    market_id: i32,
    price: Decimal,
) -> Result<(), CoreError> {
    let result = sqlx::query("UPDATE markets SET oracle_price = ? WHERE id = ?")
        .bind(price.to_canonical_string())
        .bind(market_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CoreError::not_found("market", market_id));
    }
    Ok(())
}

async fn insert_perpetual_market_in(
    conn: &mut SqliteConnection,
    market: &PerpetualMarket,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO perpetual_markets (
            id, clob_pair_id, ticker, market_id, status, atomic_resolution,
            quantum_conversion_exponent, subticks_per_tick, step_base_quantums, liquidity_tier_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(market.id)
    .bind(market.clob_pair_id)
    .bind(&market.ticker)
    .bind(market.market_id)
    .bind(market.status.as_str())
    .bind(market.atomic_resolution)
    .bind(market.quantum_conversion_exponent)
    .bind(market.subticks_per_tick)
    .bind(market.step_base_quantums)
    .bind(market.liquidity_tier_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_asset_in(conn: &mut SqliteConnection, asset: &Asset) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO assets (id, symbol, atomic_resolution, has_market, market_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(asset.id)
    .bind(&asset.symbol)
    .bind(asset.atomic_resolution)
    .bind(asset.has_market)
    .bind(asset.market_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_liquidity_tier_in(
    conn: &mut SqliteConnection,
    tier: &LiquidityTier,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO liquidity_tiers (id, name, initial_margin_ppm, maintenance_fraction_ppm)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(tier.id)
    .bind(&tier.name)
    .bind(tier.initial_margin_ppm as i64)
    .bind(tier.maintenance_fraction_ppm as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn upsert_vault_in(conn: &mut SqliteConnection, vault: &Vault) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO vaults (address, clob_pair_id) VALUES (?, ?)
        ON CONFLICT(address) DO UPDATE SET clob_pair_id = excluded.clob_pair_id
        "#,
    )
    .bind(vault.address.as_str())
    .bind(vault.clob_pair_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Run one statement group in the caller's transaction or in a fresh one.
macro_rules! in_tx {
    ($self:ident, $tx:ident, |$conn:ident| $body:expr) => {
        match $tx {
            Some(tx) => {
                let $conn: &mut SqliteConnection = &mut **tx;
                $body.await
            }
            None => {
                let mut tx = $self.pool.begin().await?;
                let $conn: &mut SqliteConnection = &mut *tx;
                $body.await?;
                tx.commit().await?;
                Ok(())
            }
        }
    };
}

impl Repository {
    pub async fn create_market(&self, market: &Market, tx: Option<&mut Tx<'_>>) -> Result<(), CoreError> {
        in_tx!(self, tx, |conn| insert_market_in(conn, market))
    }

    /// Record a new oracle price for an existing market.
    pub async fn update_oracle_price(
        &self,
        market_id: i32,
        price: Decimal,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<(), CoreError> {
        in_tx!(self, tx, |conn| update_oracle_price_in(conn, market_id, price))
    }

    pub async fn create_perpetual_market(
        &self,
        market: &PerpetualMarket,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<(), CoreError> {
        in_tx!(self, tx, |conn| insert_perpetual_market_in(conn, market))
    }

    pub async fn create_asset(&self, asset: &Asset, tx: Option<&mut Tx<'_>>) -> Result<(), CoreError> {
        in_tx!(self, tx, |conn| insert_asset_in(conn, asset))
    }

    pub async fn create_liquidity_tier(
        &self,
        tier: &LiquidityTier,
        tx: Option<&mut Tx<'_>>,
    ) -> Result<(), CoreError> {
        in_tx!(self, tx, |conn| insert_liquidity_tier_in(conn, tier))
    }

    pub async fn upsert_vault(&self, vault: &Vault, tx: Option<&mut Tx<'_>>) -> Result<(), CoreError> {
        in_tx!(self, tx, |conn| upsert_vault_in(conn, vault))
    }

    pub async fn find_all_markets(&self) -> Result<Vec<Market>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, pair, exponent, min_price_change_ppm, oracle_price FROM markets ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<Market, CoreError> {
                Ok(Market {
                    id: row.try_get("id")?,
                    pair: row.try_get("pair")?,
                    exponent: row.try_get("exponent")?,
                    min_price_change_ppm: u32_column(row, "min_price_change_ppm")?,
                    oracle_price: optional_decimal_column(row, "oracle_price")?,
                })
            })
            .collect()
    }

    pub async fn find_all_perpetual_markets(&self) -> Result<Vec<PerpetualMarket>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, clob_pair_id, ticker, market_id, status, atomic_resolution,
                   quantum_conversion_exponent, subticks_per_tick, step_base_quantums,
                   liquidity_tier_id
            FROM perpetual_markets
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<PerpetualMarket, CoreError> {
                Ok(PerpetualMarket {
                    id: row.try_get("id")?,
                    clob_pair_id: row.try_get("clob_pair_id")?,
                    ticker: row.try_get("ticker")?,
                    market_id: row.try_get("market_id")?,
                    status: enum_column(row, "status")?,
                    atomic_resolution: row.try_get("atomic_resolution")?,
                    quantum_conversion_exponent: row.try_get("quantum_conversion_exponent")?,
                    subticks_per_tick: row.try_get("subticks_per_tick")?,
                    step_base_quantums: row.try_get("step_base_quantums")?,
                    liquidity_tier_id: row.try_get("liquidity_tier_id")?,
                })
            })
            .collect()
    }

    pub async fn find_all_assets(&self) -> Result<Vec<Asset>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, symbol, atomic_resolution, has_market, market_id FROM assets ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<Asset, CoreError> {
                Ok(Asset {
                    id: row.try_get("id")?,
                    symbol: row.try_get("symbol")?,
                    atomic_resolution: row.try_get("atomic_resolution")?,
                    has_market: row.try_get::<i64, _>("has_market")? != 0,
                    market_id: row.try_get("market_id")?,
                })
            })
            .collect()
    }

    pub async fn find_all_liquidity_tiers(&self) -> Result<Vec<LiquidityTier>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, initial_margin_ppm, maintenance_fraction_ppm
            FROM liquidity_tiers
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<LiquidityTier, CoreError> {
                Ok(LiquidityTier {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    initial_margin_ppm: u32_column(row, "initial_margin_ppm")?,
                    maintenance_fraction_ppm: u32_column(row, "maintenance_fraction_ppm")?,
                })
            })
            .collect()
    }

    pub async fn find_all_vaults(&self) -> Result<Vec<Vault>, CoreError> {
        let rows = sqlx::query("SELECT address, clob_pair_id FROM vaults ORDER BY address ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> Result<Vault, CoreError> {
                Ok(Vault {
                    address: Address::new(row.try_get::<String, _>("address")?),
                    clob_pair_id: row.try_get("clob_pair_id")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReferenceSource for Repository {
    async fn scan_markets(&self) -> Result<Vec<Market>, CoreError> {
        self.find_all_markets().await
    }

    async fn scan_perpetual_markets(&self) -> Result<Vec<PerpetualMarket>, CoreError> {
        self.find_all_perpetual_markets().await
    }

    async fn scan_assets(&self) -> Result<Vec<Asset>, CoreError> {
        self.find_all_assets().await
    }

    async fn scan_liquidity_tiers(&self) -> Result<Vec<LiquidityTier>, CoreError> {
        self.find_all_liquidity_tiers().await
    }

    async fn scan_vaults(&self) -> Result<Vec<Vault>, CoreError> {
        self.find_all_vaults().await
    }

    async fn latest_block_height(&self) -> Result<Option<u32>, CoreError> {
        Ok(self.find_latest_block().await?.map(|block| block.block_height))
    }
}
