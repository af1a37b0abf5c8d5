//! Deterministic row ids.
//!
//! Every id is a UUIDv5 under one fixed namespace over the `-`-joined natural key,
//! so replaying the same chain message always addresses the same row.

use super::{Address, OrderFlags, TendermintEventId};
use uuid::Uuid;

pub const ID_NAMESPACE: Uuid = Uuid::from_u128(0x0f9da948_a6fb_4c45_9edc_4685c3f3317d);

fn derive(key: &str) -> Uuid {
    Uuid::new_v5(&ID_NAMESPACE, key.as_bytes())
}

pub fn subaccount_uuid(address: &Address, subaccount_number: u32) -> Uuid {
    derive(&format!("{}-{}", address, subaccount_number))
}

pub fn order_uuid(
    subaccount_id: Uuid,
    client_id: u32,
    clob_pair_id: i32,
    order_flags: OrderFlags,
) -> Uuid {
    derive(&format!(
        "{}-{}-{}-{}",
        subaccount_id,
        client_id,
        clob_pair_id,
        order_flags.bits()
    ))
}

pub fn perpetual_position_uuid(subaccount_id: Uuid, open_event_id: &TendermintEventId) -> Uuid {
    derive(&format!("{}-{}", subaccount_id, open_event_id.to_hex()))
}
