//! Funding, PnL and margin arithmetic over positions and reference data.
//!
//! All values are `Decimal` or integer ppm. Funding indexes are expected in human
//! units (see `numeric::funding_index_to_human`).

use super::numeric;
use crate::domain::{
    Decimal, FundingIndexMap, LiquidityTier, Market, PerpetualMarket, PerpetualPosition,
};
use crate::error::CoreError;

const ONE_MILLION: u64 = 1_000_000;

/// Positive for longs, negative for shorts.
pub fn get_signed_size(position: &PerpetualPosition) -> Decimal {
    position.signed_size()
}

/// Funding accrued since the position last settled.
///
/// `latest` holds the current index per perpetual and `last_updated` the index at
/// the position's last settlement. A rising index makes longs pay: the result is
/// `signed_size * (last_updated - latest)`.
///
/// # Errors
/// `InvalidInput` naming the position when the result leaves the decimal range.
pub fn get_unsettled_funding(
    position: &PerpetualPosition,
    latest: &FundingIndexMap,
    last_updated: &FundingIndexMap,
) -> Result<Decimal, CoreError> {
    last_updated
        .get(position.perpetual_id)
        .checked_sub(latest.get(position.perpetual_id))
        .and_then(|delta| position.signed_size().checked_mul(delta))
        .ok_or_else(|| CoreError::invalid("unsettled funding", position.id))
}

pub fn get_total_unsettled_funding(
    positions: &[PerpetualPosition],
    latest: &FundingIndexMap,
    last_updated: &FundingIndexMap,
) -> Result<Decimal, CoreError> {
    positions.iter().try_fold(Decimal::zero(), |total, position| {
        let funding = get_unsettled_funding(position, latest, last_updated)?;
        total
            .checked_add(funding)
            .ok_or_else(|| CoreError::invalid("total unsettled funding", position.id))
    })
}

/// A position paired with the funding it has accrued but not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionWithFunding {
    pub position: PerpetualPosition,
    pub unsettled_funding: Decimal,
}

/// Attach unsettled funding to each position. Positions that are not open report 0.
pub fn get_perpetual_positions_with_updated_funding(
    positions: &[PerpetualPosition],
    latest: &FundingIndexMap,
    last_updated: &FundingIndexMap,
) -> Result<Vec<PositionWithFunding>, CoreError> {
    positions
        .iter()
        .map(|position| {
            let unsettled_funding = if position.is_open() {
                get_unsettled_funding(position, latest, last_updated)?
            } else {
                Decimal::zero()
            };
            Ok(PositionWithFunding {
                position: position.clone(),
                unsettled_funding,
            })
        })
        .collect()
}

/// `(oracle_price - entry_price) * signed_size`, priced from the market that
/// backs `perpetual_market`.
///
/// # Errors
/// `InvalidInput` when `price_market` is not the perpetual's oracle market or the
/// result leaves the decimal range, and `NotFound` when that market has no oracle
/// price yet.
pub fn get_unrealized_pnl(
    position: &PerpetualPosition,
    perpetual_market: &PerpetualMarket,
    price_market: &Market,
) -> Result<Decimal, CoreError> {
    if position.perpetual_id != perpetual_market.id {
        return Err(CoreError::invalid(
            "perpetual market",
            format!(
                "{} for position on perpetual {}",
                perpetual_market.id, position.perpetual_id
            ),
        ));
    }
    if price_market.id != perpetual_market.market_id {
        return Err(CoreError::invalid(
            "price market",
            format!(
                "{} for perpetual market {}",
                price_market.id, perpetual_market.ticker
            ),
        ));
    }
    let oracle_price = price_market
        .oracle_price
        .ok_or_else(|| CoreError::not_found("oracle price", price_market.id))?;
    oracle_price
        .checked_sub(position.entry_price)
        .and_then(|delta| delta.checked_mul(position.signed_size()))
        .ok_or_else(|| CoreError::invalid("unrealized pnl", position.id))
}

/// `initial_margin_ppm * maintenance_fraction_ppm / 1e6`, truncated, in ppm.
pub fn get_maintenance_margin_ppm(initial_margin_ppm: u32, maintenance_fraction_ppm: u32) -> u64 {
    initial_margin_ppm as u64 * maintenance_fraction_ppm as u64 / ONE_MILLION
}

/// Initial and maintenance margin requirements as fractions of notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginFractions {
    pub initial: Decimal,
    pub maintenance: Decimal,
}

pub fn get_margin_fractions(tier: &LiquidityTier) -> Result<MarginFractions, CoreError> {
    let maintenance_ppm =
        get_maintenance_margin_ppm(tier.initial_margin_ppm, tier.maintenance_fraction_ppm);
    Ok(MarginFractions {
        initial: numeric::ppm_to_decimal(tier.initial_margin_ppm as i64)?,
        maintenance: numeric::ppm_to_decimal(maintenance_ppm as i64)?,
    })
}
