//! Pure computation over domain values: fixed-point codecs, chain protocol
//! translation, and funding/PnL/margin arithmetic.

pub mod financial;
pub mod numeric;
pub mod protocol;

pub use financial::{MarginFractions, PositionWithFunding};
pub use protocol::{ChainOrder, GoodTil};
