//! `ReferenceData`: the owned set of reference caches.

use super::{CacheKind, ReferenceSource};
use crate::config::RuntimeEnv;
use crate::domain::{Address, Asset, LiquidityTier, Market, PerpetualMarket};
use crate::error::CoreError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Perpetual markets indexed three ways from one scan.
#[derive(Debug, Clone, Default)]
pub struct PerpetualMarketSnapshot {
    by_id: HashMap<i32, PerpetualMarket>,
    id_by_ticker: HashMap<String, i32>,
    id_by_clob_pair_id: HashMap<i32, i32>,
}

impl PerpetualMarketSnapshot {
    pub fn from_rows(rows: Vec<PerpetualMarket>) -> Self {
        let mut snapshot = Self::default();
        for market in rows {
            snapshot.id_by_ticker.insert(market.ticker.clone(), market.id);
            snapshot
                .id_by_clob_pair_id
                .insert(market.clob_pair_id, market.id);
            snapshot.by_id.insert(market.id, market);
        }
        snapshot
    }

    pub fn get(&self, id: i32) -> Option<&PerpetualMarket> {
        self.by_id.get(&id)
    }

    pub fn get_by_ticker(&self, ticker: &str) -> Option<&PerpetualMarket> {
        self.id_by_ticker.get(ticker).and_then(|id| self.by_id.get(id))
    }

    pub fn get_by_clob_pair_id(&self, clob_pair_id: i32) -> Option<&PerpetualMarket> {
        self.id_by_clob_pair_id
            .get(&clob_pair_id)
            .and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PerpetualMarket> {
        self.by_id.values()
    }
}

type Snapshot<T> = RwLock<Arc<T>>;

fn empty<T: Default>() -> Snapshot<T> {
    RwLock::new(Arc::new(T::default()))
}

fn index_by<T>(rows: Vec<T>, key: impl Fn(&T) -> i32) -> HashMap<i32, T> {
    rows.into_iter().map(|row| (key(&row), row)).collect()
}

/// Reference caches shared by every consumer of this core.
///
/// Lookups never touch the database. `get_*` accessors treat a miss as an error
/// naming the key; `find_*` and `is_*` accessors are for validation and return
/// `None` or `false` instead.
#[derive(Debug)]
pub struct ReferenceData {
    source: Arc<dyn ReferenceSource>,
    runtime_env: RuntimeEnv,
    markets: Snapshot<HashMap<i32, Market>>,
    perpetual_markets: Snapshot<PerpetualMarketSnapshot>,
    assets: Snapshot<HashMap<i32, Asset>>,
    liquidity_tiers: Snapshot<HashMap<i32, LiquidityTier>>,
    vaults: Snapshot<HashMap<Address, i32>>,
    latest_block_height: RwLock<Option<u32>>,
}

impl ReferenceData {
    /// Create empty caches. Call [`ReferenceData::refresh_all`] before serving lookups.
    pub fn new(source: Arc<dyn ReferenceSource>, runtime_env: RuntimeEnv) -> Self {
        Self {
            source,
            runtime_env,
            markets: empty(),
            perpetual_markets: empty(),
            assets: empty(),
            liquidity_tiers: empty(),
            vaults: empty(),
            latest_block_height: RwLock::new(None),
        }
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Reload one cache from its source and swap the new snapshot in.
    ///
    /// Returns the number of rows loaded. On error the previous snapshot stays.
    pub async fn refresh(&self, kind: CacheKind) -> Result<usize, CoreError> {
        let rows = match kind {
            CacheKind::Markets => {
                let markets = index_by(self.source.scan_markets().await?, |m| m.id);
                let rows = markets.len();
                *self.markets.write() = Arc::new(markets);
                rows
            }
            CacheKind::PerpetualMarkets => {
                let snapshot =
                    PerpetualMarketSnapshot::from_rows(self.source.scan_perpetual_markets().await?);
                let rows = snapshot.len();
                *self.perpetual_markets.write() = Arc::new(snapshot);
                rows
            }
            CacheKind::Assets => {
                let assets = index_by(self.source.scan_assets().await?, |a| a.id);
                let rows = assets.len();
                *self.assets.write() = Arc::new(assets);
                rows
            }
            CacheKind::LiquidityTiers => {
                let tiers = index_by(self.source.scan_liquidity_tiers().await?, |t| t.id);
                let rows = tiers.len();
                *self.liquidity_tiers.write() = Arc::new(tiers);
                rows
            }
            CacheKind::Vaults => {
                let vaults: HashMap<Address, i32> = self
                    .source
                    .scan_vaults()
                    .await?
                    .into_iter()
                    .map(|vault| (vault.address, vault.clob_pair_id))
                    .collect();
                let rows = vaults.len();
                *self.vaults.write() = Arc::new(vaults);
                rows
            }
            CacheKind::BlockHeight => {
                let height = self.source.latest_block_height().await?;
                *self.latest_block_height.write() = height;
                usize::from(height.is_some())
            }
        };
        debug!(cache = kind.as_str(), rows, "Reference cache refreshed");
        Ok(rows)
    }

    /// Load every cache once, in dependency order.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        for kind in CacheKind::ALL {
            self.refresh(kind).await?;
        }
        info!("Reference caches loaded");
        Ok(())
    }

    /// Wipe one cache. Only permitted in the test runtime.
    pub fn clear(&self, kind: CacheKind) -> Result<(), CoreError> {
        if !self.runtime_env.is_test() {
            return Err(CoreError::ClearOutsideTest {
                env: self.runtime_env.to_string(),
            });
        }
        match kind {
            CacheKind::Markets => *self.markets.write() = Arc::default(),
            CacheKind::PerpetualMarkets => *self.perpetual_markets.write() = Arc::default(),
            CacheKind::Assets => *self.assets.write() = Arc::default(),
            CacheKind::LiquidityTiers => *self.liquidity_tiers.write() = Arc::default(),
            CacheKind::Vaults => *self.vaults.write() = Arc::default(),
            CacheKind::BlockHeight => *self.latest_block_height.write() = None,
        }
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn markets(&self) -> Arc<HashMap<i32, Market>> {
        self.markets.read().clone()
    }

    pub fn perpetual_markets(&self) -> Arc<PerpetualMarketSnapshot> {
        self.perpetual_markets.read().clone()
    }

    pub fn assets(&self) -> Arc<HashMap<i32, Asset>> {
        self.assets.read().clone()
    }

    pub fn liquidity_tiers(&self) -> Arc<HashMap<i32, LiquidityTier>> {
        self.liquidity_tiers.read().clone()
    }

    pub fn vaults(&self) -> Arc<HashMap<Address, i32>> {
        self.vaults.read().clone()
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn get_market(&self, id: i32) -> Result<Market, CoreError> {
        self.find_market(id)
            .ok_or_else(|| CoreError::not_found("market", id))
    }

    pub fn find_market(&self, id: i32) -> Option<Market> {
        self.markets().get(&id).cloned()
    }

    pub fn get_perpetual_market(&self, id: i32) -> Result<PerpetualMarket, CoreError> {
        self.perpetual_markets()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("perpetual market", id))
    }

    pub fn get_perpetual_market_by_ticker(&self, ticker: &str) -> Result<PerpetualMarket, CoreError> {
        self.find_perpetual_market_by_ticker(ticker)
            .ok_or_else(|| CoreError::not_found("perpetual market ticker", ticker))
    }

    pub fn find_perpetual_market_by_ticker(&self, ticker: &str) -> Option<PerpetualMarket> {
        self.perpetual_markets().get_by_ticker(ticker).cloned()
    }

    pub fn get_perpetual_market_by_clob_pair_id(
        &self,
        clob_pair_id: i32,
    ) -> Result<PerpetualMarket, CoreError> {
        self.find_perpetual_market_by_clob_pair_id(clob_pair_id)
            .ok_or_else(|| CoreError::not_found("perpetual market clob pair", clob_pair_id))
    }

    pub fn find_perpetual_market_by_clob_pair_id(&self, clob_pair_id: i32) -> Option<PerpetualMarket> {
        self.perpetual_markets()
            .get_by_clob_pair_id(clob_pair_id)
            .cloned()
    }

    /// The oracle market a perpetual is priced from.
    pub fn get_price_market(&self, perpetual_market: &PerpetualMarket) -> Result<Market, CoreError> {
        self.get_market(perpetual_market.market_id)
    }

    pub fn get_asset(&self, id: i32) -> Result<Asset, CoreError> {
        self.assets()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("asset", id))
    }

    pub fn get_liquidity_tier(&self, id: i32) -> Result<LiquidityTier, CoreError> {
        self.liquidity_tiers()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("liquidity tier", id))
    }

    pub fn is_vault_address(&self, address: &Address) -> bool {
        self.vaults().contains_key(address)
    }

    /// Book a vault quotes on, `None` if the address is not a vault.
    pub fn find_vault_clob_pair_id(&self, address: &Address) -> Option<i32> {
        self.vaults().get(address).copied()
    }

    pub fn get_latest_block_height(&self) -> Result<u32, CoreError> {
        let height = *self.latest_block_height.read();
        height.ok_or_else(|| CoreError::not_found("latest block height", "none loaded"))
    }
}
