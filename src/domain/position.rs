//! Perpetual positions and funding index snapshots.

use super::{Decimal, PositionSide, TendermintEventId, TimeMs};
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

impl std::str::FromStr for PositionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PositionStatus::Open),
            "CLOSED" => Ok(PositionStatus::Closed),
            other => Err(CoreError::invalid("position status", other)),
        }
    }
}

/// A perpetual position. `size` is a non-negative magnitude; direction lives
/// only in `side`. A CLOSED position has size 0 and is never mutated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpetualPosition {
    pub id: Uuid,
    pub subaccount_id: Uuid,
    pub perpetual_id: i32,
    pub side: PositionSide,
    pub status: PositionStatus,
    pub size: Decimal,
    pub max_size: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub sum_open: Decimal,
    pub sum_close: Decimal,
    pub settled_funding: Decimal,
    pub created_at: TimeMs,
    pub created_at_height: u32,
    pub closed_at: Option<TimeMs>,
    pub closed_at_height: Option<u32>,
    pub open_event_id: TendermintEventId,
    pub last_event_id: TendermintEventId,
}

/// Fields a fill or funding settlement may change on an open position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    pub side: PositionSide,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub sum_open: Decimal,
    pub sum_close: Decimal,
    pub settled_funding: Decimal,
    pub last_event_id: TendermintEventId,
}

impl PerpetualPosition {
    /// Positive for longs, negative for shorts.
    pub fn signed_size(&self) -> Decimal {
        match self.side {
            PositionSide::Long => self.size,
            PositionSide::Short => -self.size,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::Integrity(format!(
                "perpetual position {} is closed",
                self.id
            )))
        }
    }

    pub fn apply_update(&mut self, update: &PositionUpdate) -> Result<(), CoreError> {
        self.ensure_open()?;
        if update.size.is_negative() {
            return Err(CoreError::invalid(
                "position size",
                update.size.to_canonical_string(),
            ));
        }
        self.side = update.side;
        self.size = update.size;
        if update.size > self.max_size {
            self.max_size = update.size;
        }
        self.entry_price = update.entry_price;
        self.sum_open = update.sum_open;
        self.sum_close = update.sum_close;
        self.settled_funding = update.settled_funding;
        self.last_event_id = update.last_event_id;
        Ok(())
    }

    pub fn close(
        &mut self,
        exit_price: Decimal,
        closed_at: TimeMs,
        closed_at_height: u32,
        last_event_id: TendermintEventId,
    ) -> Result<(), CoreError> {
        self.ensure_open()?;
        self.status = PositionStatus::Closed;
        self.size = Decimal::zero();
        self.exit_price = Some(exit_price);
        self.closed_at = Some(closed_at);
        self.closed_at_height = Some(closed_at_height);
        self.last_event_id = last_event_id;
        Ok(())
    }
}

/// Funding index recorded for a perpetual at a block height, already scaled to
/// human units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingIndexUpdate {
    pub perpetual_id: i32,
    pub effective_at_height: u32,
    pub funding_index: Decimal,
    pub rate: Decimal,
    pub oracle_price: Decimal,
    pub event_id: TendermintEventId,
}

/// Funding index per perpetual id as of some height. Perpetuals with no update at
/// or before that height read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundingIndexMap(HashMap<i32, Decimal>);

impl FundingIndexMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, perpetual_id: i32, index: Decimal) {
        self.0.insert(perpetual_id, index);
    }

    pub fn get(&self, perpetual_id: i32) -> Decimal {
        self.0.get(&perpetual_id).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(i32, Decimal)> for FundingIndexMap {
    fn from_iter<T: IntoIterator<Item = (i32, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
