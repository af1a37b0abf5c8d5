//! Chain-native fixed-point integers to decimal values and back.
//!
//! Prices travel on chain as subticks and sizes as base quantums; both become human
//! decimals by a power-of-ten shift derived from the perpetual market. Every
//! function here is exact: a value that cannot be represented is an error, never a
//! rounded result.

use crate::domain::{Decimal, PerpetualMarket};
use crate::error::CoreError;

/// Quote currency (USDC) quantum exponent.
pub const QUOTE_CURRENCY_ATOMIC_RESOLUTION: i32 = -6;
/// Exponent of the parts-per-million denominator.
pub const PPM_EXPONENT: i32 = 6;

const FUNDING_PERIODS_PER_EIGHT_HOURS: i64 = 8;

/// Exponent that turns subticks into a quote price per whole base unit.
fn subticks_exponent(market: &PerpetualMarket) -> i32 {
    market.quantum_conversion_exponent - market.atomic_resolution
        + QUOTE_CURRENCY_ATOMIC_RESOLUTION
}

/// Minimum price increment: `subticks_per_tick` subticks expressed as a price.
pub fn tick_size(market: &PerpetualMarket) -> Result<Decimal, CoreError> {
    subticks_to_price(market.subticks_per_tick as i128, market)
}

/// Minimum size increment: `step_base_quantums` base quantums in human units.
pub fn step_size(market: &PerpetualMarket) -> Result<Decimal, CoreError> {
    quantums_to_human(market.step_base_quantums as i128, market.atomic_resolution)
}

pub fn subticks_to_price(subticks: i128, market: &PerpetualMarket) -> Result<Decimal, CoreError> {
    Decimal::scaled(subticks, subticks_exponent(market))
}

/// Inverse of [`subticks_to_price`].
///
/// # Errors
/// A price that is not a whole number of subticks is rejected with the price named.
pub fn price_to_subticks(price: Decimal, market: &PerpetualMarket) -> Result<i128, CoreError> {
    shift_to_integer(price, subticks_exponent(market), "price")
}

pub fn quantums_to_human(quantums: i128, atomic_resolution: i32) -> Result<Decimal, CoreError> {
    Decimal::scaled(quantums, atomic_resolution)
}

pub fn quantums_to_human_fixed_string(
    quantums: i128,
    atomic_resolution: i32,
) -> Result<String, CoreError> {
    Ok(quantums_to_human(quantums, atomic_resolution)?.to_canonical_string())
}

/// Inverse of [`quantums_to_human`].
pub fn human_to_quantums(human: Decimal, atomic_resolution: i32) -> Result<i128, CoreError> {
    shift_to_integer(human, atomic_resolution, "size")
}

/// Divide by `10^exponent` and require an integral result.
fn shift_to_integer(value: Decimal, exponent: i32, field: &'static str) -> Result<i128, CoreError> {
    let reject = || CoreError::invalid(field, value.to_canonical_string());
    let factor = Decimal::pow10(-exponent)?;
    value
        .checked_mul(factor)
        .and_then(|shifted| shifted.to_i128_exact())
        .ok_or_else(reject)
}

/// Protocol funding indexes are quote quantums per base quantum, in ppm. Returns
/// the index in quote units per whole base unit.
pub fn funding_index_to_human(
    raw_index: i128,
    market: &PerpetualMarket,
) -> Result<Decimal, CoreError> {
    let exponent = QUOTE_CURRENCY_ATOMIC_RESOLUTION - market.atomic_resolution - PPM_EXPONENT;
    Decimal::scaled(raw_index, exponent)
}

pub fn funding_index_to_human_fixed_string(
    raw_index: i128,
    market: &PerpetualMarket,
) -> Result<String, CoreError> {
    Ok(funding_index_to_human(raw_index, market)?.to_canonical_string())
}

/// 8-hour funding value in ppm to a 1-hour rate: `ppm / 1e6 / 8`.
pub fn funding_8hour_value_ppm_to_1hour_rate(ppm: i64) -> Result<Decimal, CoreError> {
    let fraction = ppm_to_decimal(ppm)?;
    fraction
        .checked_div(Decimal::from_i64(FUNDING_PERIODS_PER_EIGHT_HOURS))
        .ok_or_else(|| CoreError::invalid("funding ppm", ppm))
}

pub fn ppm_to_decimal(ppm: i64) -> Result<Decimal, CoreError> {
    Decimal::scaled(ppm as i128, -PPM_EXPONENT)
}

pub fn ppm_to_string(ppm: i64) -> Result<String, CoreError> {
    Ok(ppm_to_decimal(ppm)?.to_canonical_string())
}

/// Decode a big-endian two's-complement integer of up to 16 bytes.
/// An empty slice decodes to 0.
pub fn decode_serialized_int(bytes: &[u8]) -> Result<i128, CoreError> {
    if bytes.len() > 16 {
        return Err(CoreError::invalid("serialized integer", hex::encode(bytes)));
    }
    let Some(first) = bytes.first() else {
        return Ok(0);
    };
    let fill = if first & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buf))
}

/// Shortest big-endian two's-complement encoding of `value`.
pub fn encode_serialized_int(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 15 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

pub fn serialized_quantums_to_abs_human(
    bytes: &[u8],
    atomic_resolution: i32,
) -> Result<Decimal, CoreError> {
    let quantums = decode_serialized_int(bytes)?;
    let magnitude = quantums
        .checked_abs()
        .ok_or_else(|| CoreError::invalid("serialized integer", hex::encode(bytes)))?;
    quantums_to_human(magnitude, atomic_resolution)
}

pub fn serialized_quantums_to_abs_human_fixed_string(
    bytes: &[u8],
    atomic_resolution: i32,
) -> Result<String, CoreError> {
    Ok(serialized_quantums_to_abs_human(bytes, atomic_resolution)?.to_canonical_string())
}
