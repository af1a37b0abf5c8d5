//! Domain types and determinism layer for the indexer persistence core.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Address, OrderSide, PositionSide
//! - Reference data rows (markets, perpetual markets, assets, liquidity tiers, vaults, blocks)
//! - Order rows and the upsert status-merge rules
//! - Perpetual positions and funding index maps
//! - Tendermint event ids with byte-order-preserving encoding
//! - Deterministic UUIDv5 row identities

pub mod decimal;
pub mod event;
pub mod identity;
pub mod market;
pub mod order;
pub mod position;
pub mod primitives;

pub use decimal::Decimal;
pub use event::{EventSource, TendermintEventId};
pub use market::{
    Asset, Block, LiquidityTier, Market, PerpetualMarket, PerpetualMarketStatus, Vault,
};
pub use order::{Order, OrderFlags, OrderStatus, OrderType, OrderUpsert, TimeInForce};
pub use position::{
    FundingIndexMap, FundingIndexUpdate, PerpetualPosition, PositionStatus, PositionUpdate,
};
pub use primitives::{Address, OrderSide, PositionSide, TimeMs};
