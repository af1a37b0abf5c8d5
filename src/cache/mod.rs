//! In-memory reference data caches.
//!
//! Each cache is an immutable snapshot behind an `Arc` that a refresh replaces
//! wholesale. Readers clone the `Arc` and never observe a half-built map; a reader
//! holding an old snapshot during a swap simply sees the previous refresh.

use crate::domain::{Asset, LiquidityTier, Market, PerpetualMarket, Vault};
use crate::error::CoreError;
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod reference;
pub mod refresh;

pub use mock::MockReferenceSource;
pub use reference::{PerpetualMarketSnapshot, ReferenceData};

/// Full-table scans the caches are rebuilt from.
#[async_trait]
pub trait ReferenceSource: Send + Sync + fmt::Debug {
    async fn scan_markets(&self) -> Result<Vec<Market>, CoreError>;

    async fn scan_perpetual_markets(&self) -> Result<Vec<PerpetualMarket>, CoreError>;

    async fn scan_assets(&self) -> Result<Vec<Asset>, CoreError>;

    async fn scan_liquidity_tiers(&self) -> Result<Vec<LiquidityTier>, CoreError>;

    async fn scan_vaults(&self) -> Result<Vec<Vault>, CoreError>;

    /// Height of the newest stored block, `None` before the first block.
    async fn latest_block_height(&self) -> Result<Option<u32>, CoreError>;
}

/// One independently refreshed cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Markets,
    PerpetualMarkets,
    Assets,
    LiquidityTiers,
    Vaults,
    BlockHeight,
}

impl CacheKind {
    pub const ALL: [CacheKind; 6] = [
        CacheKind::Markets,
        CacheKind::PerpetualMarkets,
        CacheKind::Assets,
        CacheKind::LiquidityTiers,
        CacheKind::Vaults,
        CacheKind::BlockHeight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Markets => "markets",
            CacheKind::PerpetualMarkets => "perpetual_markets",
            CacheKind::Assets => "assets",
            CacheKind::LiquidityTiers => "liquidity_tiers",
            CacheKind::Vaults => "vaults",
            CacheKind::BlockHeight => "block_height",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
