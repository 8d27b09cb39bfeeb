//! Read-only access to market data for chart generation.
//!
//! Configuration tables, timeframe and market-time helpers, the candle-source
//! strategy, and Postgres sessions that resolve symbols and fetch candles, zones,
//! and volume profiles.

pub mod config;
pub mod error;
pub mod market;
pub mod models;
pub mod source;
pub mod timeframe;
pub mod tz;

pub use error::{StoreError, StoreResult};
pub use market::{Connect, MarketData};
