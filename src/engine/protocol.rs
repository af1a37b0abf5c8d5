//! Translation of decoded chain order messages into domain values.
//!
//! Every raw enum is matched exhaustively; an unknown value is an error naming
//! it, never a default.

use super::numeric;
use crate::domain::{
    Decimal, OrderFlags, OrderSide, OrderStatus, OrderType, OrderUpsert, PerpetualMarket,
    TimeInForce, TimeMs,
};
use crate::error::CoreError;
use uuid::Uuid;

/// Expiry oneof carried on a chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoodTil {
    Block(u32),
    /// Unix seconds.
    BlockTime(u32),
}

/// Order as decoded from a chain message by the block processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOrder {
    pub subaccount_id: Uuid,
    pub client_id: u32,
    pub clob_pair_id: i32,
    pub order_flags: u32,
    pub side: i32,
    pub quantums: u64,
    pub subticks: u64,
    pub good_til: Option<GoodTil>,
    pub time_in_force: i32,
    pub reduce_only: bool,
    pub client_metadata: u32,
    pub condition_type: i32,
    pub conditional_order_trigger_subticks: u64,
}

pub fn order_side(raw: i32) -> Result<OrderSide, CoreError> {
    match raw {
        1 => Ok(OrderSide::Buy),
        2 => Ok(OrderSide::Sell),
        other => Err(CoreError::invalid("order side", other)),
    }
}

pub fn time_in_force(raw: i32) -> Result<TimeInForce, CoreError> {
    match raw {
        0 => Ok(TimeInForce::Gtt),
        1 => Ok(TimeInForce::Ioc),
        2 => Ok(TimeInForce::PostOnly),
        3 => Ok(TimeInForce::Fok),
        other => Err(CoreError::invalid("time in force", other)),
    }
}

pub fn condition_type_to_order_type(raw: i32) -> Result<OrderType, CoreError> {
    match raw {
        0 => Ok(OrderType::Limit),
        1 => Ok(OrderType::StopLimit),
        2 => Ok(OrderType::TakeProfit),
        other => Err(CoreError::invalid("condition type", other)),
    }
}

/// Split the expiry oneof into (`good_til_block`, `good_til_block_time`).
///
/// Short-term orders must expire by height; long-term and conditional orders by
/// wall-clock time.
pub fn expiry(
    flags: OrderFlags,
    good_til: Option<GoodTil>,
) -> Result<(Option<u32>, Option<TimeMs>), CoreError> {
    match (flags.is_long_term_or_conditional(), good_til) {
        (false, Some(GoodTil::Block(height))) => Ok((Some(height), None)),
        (true, Some(GoodTil::BlockTime(seconds))) => {
            Ok((None, Some(TimeMs::new(seconds as i64 * 1_000))))
        }
        (_, other) => Err(CoreError::invalid(
            "good til",
            format!("{:?} for order flags {}", other, flags.bits()),
        )),
    }
}

/// Build the snapshot an order upsert writes for a chain order on `market`.
///
/// `total_filled_quantums` is the cumulative fill the event reports.
pub fn to_order_upsert(
    order: &ChainOrder,
    market: &PerpetualMarket,
    total_filled_quantums: u64,
    status_override: Option<OrderStatus>,
    updated_at: TimeMs,
    updated_at_height: u32,
) -> Result<OrderUpsert, CoreError> {
    if order.clob_pair_id != market.clob_pair_id {
        return Err(CoreError::invalid(
            "clob pair id",
            format!("{} (market {})", order.clob_pair_id, market.ticker),
        ));
    }
    let flags = OrderFlags(order.order_flags);
    let (good_til_block, good_til_block_time) = expiry(flags, order.good_til)?;
    let trigger_price = if order.conditional_order_trigger_subticks == 0 {
        None
    } else {
        Some(numeric::subticks_to_price(
            order.conditional_order_trigger_subticks as i128,
            market,
        )?)
    };
    let size = numeric::quantums_to_human(order.quantums as i128, market.atomic_resolution)?;
    let total_filled: Decimal =
        numeric::quantums_to_human(total_filled_quantums as i128, market.atomic_resolution)?;

    Ok(OrderUpsert {
        subaccount_id: order.subaccount_id,
        client_id: order.client_id,
        clob_pair_id: order.clob_pair_id,
        side: order_side(order.side)?,
        size,
        total_filled,
        price: numeric::subticks_to_price(order.subticks as i128, market)?,
        order_type: condition_type_to_order_type(order.condition_type)?,
        status_override,
        time_in_force: time_in_force(order.time_in_force)?,
        reduce_only: order.reduce_only,
        order_flags: flags,
        good_til_block,
        good_til_block_time,
        created_at_height: None,
        client_metadata: order.client_metadata,
        trigger_price,
        updated_at,
        updated_at_height,
    })
}
