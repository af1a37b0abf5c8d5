//! Reference data rows: oracle markets, perpetual markets, assets, liquidity tiers,
//! vaults and blocks.

use super::{Address, Decimal, TimeMs};
use crate::error::CoreError;
use serde::{Deserialize, Serialize};

/// Oracle market. `exponent` relates the raw oracle price to the decimal price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: i32,
    pub pair: String,
    pub exponent: i32,
    pub min_price_change_ppm: u32,
    pub oracle_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerpetualMarketStatus {
    Active,
    Paused,
    CancelOnly,
    PostOnly,
    Initializing,
    FinalSettlement,
}

impl PerpetualMarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerpetualMarketStatus::Active => "ACTIVE",
            PerpetualMarketStatus::Paused => "PAUSED",
            PerpetualMarketStatus::CancelOnly => "CANCEL_ONLY",
            PerpetualMarketStatus::PostOnly => "POST_ONLY",
            PerpetualMarketStatus::Initializing => "INITIALIZING",
            PerpetualMarketStatus::FinalSettlement => "FINAL_SETTLEMENT",
        }
    }
}

impl std::str::FromStr for PerpetualMarketStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(PerpetualMarketStatus::Active),
            "PAUSED" => Ok(PerpetualMarketStatus::Paused),
            "CANCEL_ONLY" => Ok(PerpetualMarketStatus::CancelOnly),
            "POST_ONLY" => Ok(PerpetualMarketStatus::PostOnly),
            "INITIALIZING" => Ok(PerpetualMarketStatus::Initializing),
            "FINAL_SETTLEMENT" => Ok(PerpetualMarketStatus::FinalSettlement),
            other => Err(CoreError::invalid("perpetual market status", other)),
        }
    }
}

/// Perpetual market. `id` is the storage id; `clob_pair_id` is the id the
/// exchange assigns to the order book and is what order messages carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpetualMarket {
    pub id: i32,
    pub clob_pair_id: i32,
    pub ticker: String,
    pub market_id: i32,
    pub status: PerpetualMarketStatus,
    pub atomic_resolution: i32,
    pub quantum_conversion_exponent: i32,
    pub subticks_per_tick: i64,
    pub step_base_quantums: i64,
    pub liquidity_tier_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i32,
    pub symbol: String,
    pub atomic_resolution: i32,
    pub has_market: bool,
    pub market_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityTier {
    pub id: i32,
    pub name: String,
    pub initial_margin_ppm: u32,
    pub maintenance_fraction_ppm: u32,
}

/// A vault subaccount owner and the book it quotes on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub address: Address,
    pub clob_pair_id: i32,
}

/// Authoritative (height, time) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_height: u32,
    pub time: TimeMs,
}
