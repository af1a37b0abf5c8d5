//! Order rows and the status-merge rules applied when an order snapshot is upserted.
//!
//! Chain events can arrive replayed or out of order, so every upsert carries a full
//! snapshot of the order and the stored status is recomputed from it rather than
//! transitioned step by step. One rule is not derivable from the snapshot: once the
//! matching engine has reported BEST_EFFORT_CANCELED, a later (possibly stale) fill
//! report must not bring the order back.

use super::{identity, Decimal, OrderSide, TimeMs};
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Untriggered,
    Filled,
    Canceled,
    BestEffortCanceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Untriggered => "UNTRIGGERED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::BestEffortCanceled => "BEST_EFFORT_CANCELED",
        }
    }

    /// Terminal under normal flow. Explicit corrective updates may still target these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::BestEffortCanceled
        )
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(OrderStatus::Open),
            "UNTRIGGERED" => Ok(OrderStatus::Untriggered),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELED" => Ok(OrderStatus::Canceled),
            "BEST_EFFORT_CANCELED" => Ok(OrderStatus::BestEffortCanceled),
            other => Err(CoreError::invalid("order status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopLimit,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "LIMIT",
            OrderType::Market => "MARKET",
            OrderType::StopLimit => "STOP_LIMIT",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfit => "TAKE_PROFIT",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIMIT" => Ok(OrderType::Limit),
            "MARKET" => Ok(OrderType::Market),
            "STOP_LIMIT" => Ok(OrderType::StopLimit),
            "STOP_MARKET" => Ok(OrderType::StopMarket),
            "TAKE_PROFIT" => Ok(OrderType::TakeProfit),
            "TAKE_PROFIT_MARKET" => Ok(OrderType::TakeProfitMarket),
            other => Err(CoreError::invalid("order type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    Gtt,
    Fok,
    Ioc,
    PostOnly,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtt => "GTT",
            TimeInForce::Fok => "FOK",
            TimeInForce::Ioc => "IOC",
            TimeInForce::PostOnly => "POST_ONLY",
        }
    }
}

impl std::str::FromStr for TimeInForce {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GTT" => Ok(TimeInForce::Gtt),
            "FOK" => Ok(TimeInForce::Fok),
            "IOC" => Ok(TimeInForce::Ioc),
            "POST_ONLY" => Ok(TimeInForce::PostOnly),
            other => Err(CoreError::invalid("time in force", other)),
        }
    }
}

/// Order flag bitfield as carried in the order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderFlags(pub u32);

impl OrderFlags {
    pub const SHORT_TERM: OrderFlags = OrderFlags(0);
    pub const CONDITIONAL: OrderFlags = OrderFlags(32);
    pub const LONG_TERM: OrderFlags = OrderFlags(64);
    pub const TWAP: OrderFlags = OrderFlags(128);

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Long-term and conditional orders expire by wall-clock time; everything
    /// else expires by block height.
    pub fn is_long_term_or_conditional(&self) -> bool {
        self.0 & (Self::LONG_TERM.0 | Self::CONDITIONAL.0) != 0
    }

    pub fn is_conditional(&self) -> bool {
        self.0 == Self::CONDITIONAL.0
    }

    pub fn is_twap(&self) -> bool {
        self.0 == Self::TWAP.0
    }
}

/// A stored order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub subaccount_id: Uuid,
    pub client_id: u32,
    pub clob_pair_id: i32,
    pub side: OrderSide,
    pub size: Decimal,
    pub total_filled: Decimal,
    pub price: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub order_flags: OrderFlags,
    pub good_til_block: Option<u32>,
    pub good_til_block_time: Option<TimeMs>,
    pub created_at_height: Option<u32>,
    pub client_metadata: u32,
    pub trigger_price: Option<Decimal>,
    pub updated_at: TimeMs,
    pub updated_at_height: u32,
}

/// Snapshot of an order as reported by one chain event.
///
/// `status_override` carries a status the event states explicitly (a cancel, an
/// untriggered conditional placement). When it is `None` or `Some(Open)` the status
/// is derived from `total_filled` against `size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpsert {
    pub subaccount_id: Uuid,
    pub client_id: u32,
    pub clob_pair_id: i32,
    pub side: OrderSide,
    pub size: Decimal,
    pub total_filled: Decimal,
    pub price: Decimal,
    pub order_type: OrderType,
    pub status_override: Option<OrderStatus>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub order_flags: OrderFlags,
    pub good_til_block: Option<u32>,
    pub good_til_block_time: Option<TimeMs>,
    pub created_at_height: Option<u32>,
    pub client_metadata: u32,
    pub trigger_price: Option<Decimal>,
    pub updated_at: TimeMs,
    pub updated_at_height: u32,
}

impl OrderUpsert {
    pub fn id(&self) -> Uuid {
        identity::order_uuid(
            self.subaccount_id,
            self.client_id,
            self.clob_pair_id,
            self.order_flags,
        )
    }
}

/// Exactly one expiry must be present.
pub fn validate_expiry(
    good_til_block: Option<u32>,
    good_til_block_time: Option<TimeMs>,
) -> Result<(), CoreError> {
    match (good_til_block, good_til_block_time) {
        (Some(block), Some(time)) => Err(CoreError::Integrity(format!(
            "order has both good_til_block {} and good_til_block_time {}",
            block,
            time.as_i64()
        ))),
        (None, None) => Err(CoreError::Integrity(
            "order has neither good_til_block nor good_til_block_time".to_string(),
        )),
        _ => Ok(()),
    }
}

pub fn derive_status(total_filled: Decimal, size: Decimal) -> OrderStatus {
    if total_filled >= size {
        OrderStatus::Filled
    } else {
        OrderStatus::Open
    }
}

/// Status an upsert writes, given the status currently stored (if any).
pub fn resolve_status(existing: Option<OrderStatus>, incoming: &OrderUpsert) -> OrderStatus {
    if existing == Some(OrderStatus::BestEffortCanceled) {
        return OrderStatus::BestEffortCanceled;
    }
    match incoming.status_override {
        Some(status) if status != OrderStatus::Open => status,
        _ => derive_status(incoming.total_filled, incoming.size),
    }
}

/// Build the row an upsert writes. Every snapshot field replaces the stored one,
/// except `created_at_height`, which is kept when the snapshot omits it (and
/// defaults to `updated_at_height` for a new row).
pub fn merge(existing: Option<&Order>, incoming: &OrderUpsert) -> Result<Order, CoreError> {
    validate_expiry(incoming.good_til_block, incoming.good_til_block_time)?;
    let status = resolve_status(existing.map(|o| o.status), incoming);
    let created_at_height = match existing {
        Some(order) => incoming.created_at_height.or(order.created_at_height),
        None => incoming
            .created_at_height
            .or(Some(incoming.updated_at_height)),
    };

    Ok(Order {
        id: incoming.id(),
        subaccount_id: incoming.subaccount_id,
        client_id: incoming.client_id,
        clob_pair_id: incoming.clob_pair_id,
        side: incoming.side,
        size: incoming.size,
        total_filled: incoming.total_filled,
        price: incoming.price,
        order_type: incoming.order_type,
        status,
        time_in_force: incoming.time_in_force,
        reduce_only: incoming.reduce_only,
        order_flags: incoming.order_flags,
        good_til_block: incoming.good_til_block,
        good_til_block_time: incoming.good_til_block_time,
        created_at_height,
        client_metadata: incoming.client_metadata,
        trigger_price: incoming.trigger_price,
        updated_at: incoming.updated_at,
        updated_at_height: incoming.updated_at_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{identity::subaccount_uuid, Address};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn snapshot(total_filled: &str, status_override: Option<OrderStatus>) -> OrderUpsert {
        OrderUpsert {
            subaccount_id: subaccount_uuid(&Address::new("dydx1abc"), 0),
            client_id: 1,
            clob_pair_id: 1,
            side: OrderSide::Buy,
            size: d("10"),
            total_filled: d(total_filled),
            price: d("20000"),
            order_type: OrderType::Limit,
            status_override,
            time_in_force: TimeInForce::Fok,
            reduce_only: false,
            order_flags: OrderFlags::SHORT_TERM,
            good_til_block: Some(100),
            good_til_block_time: None,
            created_at_height: None,
            client_metadata: 0,
            trigger_price: None,
            updated_at: TimeMs::new(1_674_345_600_000),
            updated_at_height: 1,
        }
    }

    #[test]
    fn test_is_long_term_or_conditional() {
        let cases = [
            (64, true),
            (65, true),
            (32, true),
            (33, true),
            (128, false),
            (0, false),
            (191, true),
            (159, false),
        ];
        for (bits, expected) in cases {
            assert_eq!(
                OrderFlags(bits).is_long_term_or_conditional(),
                expected,
                "flags {}",
                bits
            );
        }
    }

    #[test]
    fn test_derive_status() {
        assert_eq!(derive_status(d("0"), d("10")), OrderStatus::Open);
        assert_eq!(derive_status(d("9.99"), d("10")), OrderStatus::Open);
        assert_eq!(derive_status(d("10"), d("10")), OrderStatus::Filled);
        assert_eq!(derive_status(d("11"), d("10")), OrderStatus::Filled);
    }

    #[test]
    fn test_new_order_status() {
        assert_eq!(resolve_status(None, &snapshot("0", None)), OrderStatus::Open);
        assert_eq!(
            resolve_status(None, &snapshot("10", Some(OrderStatus::Open))),
            OrderStatus::Filled
        );
        assert_eq!(
            resolve_status(None, &snapshot("0", Some(OrderStatus::Untriggered))),
            OrderStatus::Untriggered
        );
    }

    #[test]
    fn test_explicit_status_overrides_derived() {
        let incoming = snapshot("10", Some(OrderStatus::BestEffortCanceled));
        assert_eq!(
            resolve_status(Some(OrderStatus::Open), &incoming),
            OrderStatus::BestEffortCanceled
        );
        let incoming = snapshot("3", Some(OrderStatus::Canceled));
        assert_eq!(
            resolve_status(Some(OrderStatus::Open), &incoming),
            OrderStatus::Canceled
        );
    }

    #[test]
    fn test_best_effort_canceled_is_never_resurrected() {
        for incoming in [
            snapshot("2", None),
            snapshot("10", None),
            snapshot("0", Some(OrderStatus::Open)),
            snapshot("0", Some(OrderStatus::Canceled)),
        ] {
            assert_eq!(
                resolve_status(Some(OrderStatus::BestEffortCanceled), &incoming),
                OrderStatus::BestEffortCanceled
            );
        }
    }

    #[test]
    fn test_filled_order_recomputed_from_snapshot() {
        let incoming = snapshot("4", None);
        assert_eq!(resolve_status(Some(OrderStatus::Filled), &incoming), OrderStatus::Open);
    }

    #[test]
    fn test_merge_keeps_created_height_when_omitted() {
        let first = merge(None, &OrderUpsert {
            created_at_height: Some(2),
            ..snapshot("0", None)
        })
        .unwrap();
        let second = merge(Some(&first), &snapshot("5", None)).unwrap();
        assert_eq!(second.created_at_height, Some(2));
        assert_eq!(second.total_filled, d("5"));
        assert_eq!(second.id, first.id);

        let fresh = merge(None, &snapshot("0", None)).unwrap();
        assert_eq!(fresh.created_at_height, Some(1));
    }

    #[test]
    fn test_merge_rejects_conflicting_expiry() {
        let incoming = OrderUpsert {
            good_til_block_time: Some(TimeMs::new(1)),
            ..snapshot("0", None)
        };
        let err = merge(None, &incoming).unwrap_err();
        assert!(matches!(err, CoreError::Integrity(_)));
        assert!(err.is_constraint_violation());

        let incoming = OrderUpsert {
            good_til_block: None,
            ..snapshot("0", None)
        };
        assert!(merge(None, &incoming).is_err());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            OrderStatus::Open,
            OrderStatus::Untriggered,
            OrderStatus::Filled,
            OrderStatus::Canceled,
            OrderStatus::BestEffortCanceled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("PENDING".parse::<OrderStatus>().is_err());
    }
}
