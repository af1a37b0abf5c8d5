pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;

pub use cache::{CacheKind, MockReferenceSource, ReferenceData, ReferenceSource};
pub use config::{Config, RuntimeEnv};
pub use db::{init_db, Repository, Tx};
pub use domain::{
    Address, Decimal, Order, OrderFlags, OrderStatus, OrderUpsert, PerpetualPosition,
    TendermintEventId, TimeMs,
};
pub use error::CoreError;
