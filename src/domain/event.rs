//! Tendermint event ids: a total order over sub-events of the chain.
//!
//! An id is 12 bytes: big-endian u32 block height, big-endian u32
//! `transaction_index + 2`, big-endian u32 event index. Because every field is
//! fixed-width, unsigned and big-endian, comparing raw id bytes gives the same
//! answer as comparing the decoded triples.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub const EVENT_ID_LEN: usize = 12;

/// Transaction index recorded for begin-block events.
pub const BEGIN_BLOCK_TRANSACTION_INDEX: i32 = -2;
/// Transaction index recorded for end-block events.
pub const END_BLOCK_TRANSACTION_INDEX: i32 = -1;

const TRANSACTION_INDEX_OFFSET: i64 = 2;

/// Where inside a block an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    BeginBlock,
    EndBlock,
    Transaction(u32),
}

impl EventSource {
    /// Widened to `i64` so an out-of-range transaction number reaches
    /// [`TendermintEventId::new`] intact and is rejected there.
    pub fn transaction_index(&self) -> i64 {
        match self {
            EventSource::BeginBlock => BEGIN_BLOCK_TRANSACTION_INDEX as i64,
            EventSource::EndBlock => END_BLOCK_TRANSACTION_INDEX as i64,
            EventSource::Transaction(i) => i64::from(*i),
        }
    }

    /// Translate the raw block-event enum carried on indexer events
    /// (1 = begin block, 2 = end block).
    pub fn from_block_event(raw: i32) -> Result<Self, CoreError> {
        match raw {
            1 => Ok(EventSource::BeginBlock),
            2 => Ok(EventSource::EndBlock),
            other => Err(CoreError::invalid("block event type", other)),
        }
    }
}

/// Decoded form of a 12-byte event id.
///
/// Field order matters: the derived `Ord` compares height, then transaction
/// index, then event index. Deserialization goes through [`TendermintEventId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEventId")]
pub struct TendermintEventId {
    pub block_height: u32,
    pub transaction_index: i32,
    pub event_index: u32,
}

#[derive(Deserialize)]
struct RawEventId {
    block_height: i64,
    transaction_index: i64,
    event_index: i64,
}

impl TryFrom<RawEventId> for TendermintEventId {
    type Error = CoreError;

    fn try_from(raw: RawEventId) -> Result<Self, Self::Error> {
        Self::new(raw.block_height, raw.transaction_index, raw.event_index)
    }
}

impl TendermintEventId {
    /// Validate and build an id.
    ///
    /// # Errors
    /// Heights outside `0..=u32::MAX`, transaction indexes outside `-2..=i32::MAX`
    /// and negative event indexes are rejected. Nothing is truncated.
    pub fn new(
        block_height: i64,
        transaction_index: i64,
        event_index: i64,
    ) -> Result<Self, CoreError> {
        let block_height = u32::try_from(block_height)
            .map_err(|_| CoreError::invalid("block height", block_height))?;
        let transaction_index = i32::try_from(transaction_index)
            .ok()
            .filter(|t| *t >= BEGIN_BLOCK_TRANSACTION_INDEX)
            .ok_or_else(|| CoreError::invalid("transaction index", transaction_index))?;
        let event_index = u32::try_from(event_index)
            .map_err(|_| CoreError::invalid("event index", event_index))?;
        Ok(Self {
            block_height,
            transaction_index,
            event_index,
        })
    }

    pub fn from_source(
        block_height: i64,
        source: EventSource,
        event_index: u32,
    ) -> Result<Self, CoreError> {
        Self::new(block_height, source.transaction_index(), i64::from(event_index))
    }

    pub fn encode(&self) -> [u8; EVENT_ID_LEN] {
        let shifted = (self.transaction_index as i64 + TRANSACTION_INDEX_OFFSET) as u32;
        let mut out = [0u8; EVENT_ID_LEN];
        out[0..4].copy_from_slice(&self.block_height.to_be_bytes());
        out[4..8].copy_from_slice(&shifted.to_be_bytes());
        out[8..12].copy_from_slice(&self.event_index.to_be_bytes());
        out
    }

    /// Decode a stored id.
    ///
    /// # Errors
    /// Rejects input that is not exactly 12 bytes, or whose transaction field does
    /// not map back into the i32 index space.
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let bytes: &[u8; EVENT_ID_LEN] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid("event id", hex::encode(bytes)))?;
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let transaction_index = i32::try_from(word(4) as i64 - TRANSACTION_INDEX_OFFSET)
            .map_err(|_| CoreError::invalid("event id", hex::encode(bytes)))?;
        Ok(Self {
            block_height: word(0),
            transaction_index,
            event_index: word(8),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn source(&self) -> EventSource {
        match self.transaction_index {
            BEGIN_BLOCK_TRANSACTION_INDEX => EventSource::BeginBlock,
            END_BLOCK_TRANSACTION_INDEX => EventSource::EndBlock,
            i => EventSource::Transaction(i as u32),
        }
    }
}

impl fmt::Display for TendermintEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Three-way comparison on (height, transaction index, event index).
/// Returns -1, 0 or 1.
pub fn compare(a: &TendermintEventId, b: &TendermintEventId) -> i8 {
    match a.cmp(b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Sort raw stored ids in chain order without decoding them.
pub fn sort_encoded_ids(ids: &mut [Vec<u8>]) {
    ids.sort();
}
