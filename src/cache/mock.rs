//! Mock reference source for testing without a database.

use super::{CacheKind, ReferenceSource};
use crate::domain::{Asset, LiquidityTier, Market, PerpetualMarket, Vault};
use crate::error::CoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct MockTables {
    markets: Vec<Market>,
    perpetual_markets: Vec<PerpetualMarket>,
    assets: Vec<Asset>,
    liquidity_tiers: Vec<LiquidityTier>,
    vaults: Vec<Vault>,
    latest_block_height: Option<u32>,
}

/// Mock source that serves predefined rows.
///
/// Rows can be replaced after construction, and the next N scans of a given
/// cache can be made to fail.
#[derive(Debug, Default)]
pub struct MockReferenceSource {
    tables: Mutex<MockTables>,
    failures: Mutex<HashMap<CacheKind, usize>>,
    scans: Mutex<HashMap<CacheKind, usize>>,
}

impl MockReferenceSource {
    /// Create a new mock source with empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(self, market: Market) -> Self {
        self.tables.lock().markets.push(market);
        self
    }

    pub fn with_perpetual_market(self, market: PerpetualMarket) -> Self {
        self.tables.lock().perpetual_markets.push(market);
        self
    }

    pub fn with_asset(self, asset: Asset) -> Self {
        self.tables.lock().assets.push(asset);
        self
    }

    pub fn with_liquidity_tier(self, tier: LiquidityTier) -> Self {
        self.tables.lock().liquidity_tiers.push(tier);
        self
    }

    pub fn with_vault(self, vault: Vault) -> Self {
        self.tables.lock().vaults.push(vault);
        self
    }

    pub fn with_latest_block_height(self, height: u32) -> Self {
        self.tables.lock().latest_block_height = Some(height);
        self
    }

    /// Replace the perpetual market table seen by later scans.
    pub fn set_perpetual_markets(&self, markets: Vec<PerpetualMarket>) {
        self.tables.lock().perpetual_markets = markets;
    }

    pub fn set_latest_block_height(&self, height: u32) {
        self.tables.lock().latest_block_height = Some(height);
    }

    /// Make the next scan of `kind` fail.
    pub fn fail_next(&self, kind: CacheKind) {
        self.fail_times(kind, 1);
    }

    /// Make the next `times` scans of `kind` fail.
    pub fn fail_times(&self, kind: CacheKind, times: usize) {
        *self.failures.lock().entry(kind).or_insert(0) += times;
    }

    /// Number of scans of `kind` attempted so far, failed ones included.
    pub fn scan_count(&self, kind: CacheKind) -> usize {
        self.scans.lock().get(&kind).copied().unwrap_or(0)
    }

    fn scan<T>(&self, kind: CacheKind, read: impl FnOnce(&MockTables) -> T) -> Result<T, CoreError> {
        *self.scans.lock().entry(kind).or_insert(0) += 1;
        if let Some(remaining) = self.failures.lock().get_mut(&kind).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(CoreError::Db(sqlx::Error::Protocol(format!(
                "injected {} scan failure",
                kind
            ))));
        }
        Ok(read(&self.tables.lock()))
    }
}

#[async_trait]
impl ReferenceSource for MockReferenceSource {
    async fn scan_markets(&self) -> Result<Vec<Market>, CoreError> {
        self.scan(CacheKind::Markets, |t| t.markets.clone())
    }

    async fn scan_perpetual_markets(&self) -> Result<Vec<PerpetualMarket>, CoreError> {
        self.scan(CacheKind::PerpetualMarkets, |t| t.perpetual_markets.clone())
    }

    async fn scan_assets(&self) -> Result<Vec<Asset>, CoreError> {
        self.scan(CacheKind::Assets, |t| t.assets.clone())
    }

    async fn scan_liquidity_tiers(&self) -> Result<Vec<LiquidityTier>, CoreError> {
        self.scan(CacheKind::LiquidityTiers, |t| t.liquidity_tiers.clone())
    }

    async fn scan_vaults(&self) -> Result<Vec<Vault>, CoreError> {
        self.scan(CacheKind::Vaults, |t| t.vaults.clone())
    }

    async fn latest_block_height(&self) -> Result<Option<u32>, CoreError> {
        self.scan(CacheKind::BlockHeight, |t| t.latest_block_height)
    }
}
