//! Market-data sessions: read-only access to symbols, candles, zones, and volume profiles.
//!
//! A [`Connect`] implementation opens one [`MarketData`] session per family. The
//! session owns its connection and releases it on drop, so callers scope it to the
//! work at hand and open a fresh one after a failure. Postgres lives in `pg.rs`.

use chrono::{DateTime, Utc};

use crate::{
    config::InstrumentFamily,
    error::StoreResult,
    models::{Candle, SymbolId, VolumeProfileNode, Zone},
    source::CandleRequest,
};

pub mod pg;
mod rows;

pub use pg::{PgConnector, PgMarketData};

/// Read operations of one open session, bound to one instrument family.
pub trait MarketData {
    /// Family this session reads.
    fn family(&self) -> InstrumentFamily;

    /// Ticker -> internal id. `Ok(None)` when the ticker is unknown.
    fn resolve_symbol(&mut self, ticker: &str) -> StoreResult<Option<SymbolId>>;

    /// Every known ticker of the family, sorted.
    fn list_symbols(&mut self) -> StoreResult<Vec<String>>;

    /// Ascending candles for the request, after the request's padding policy.
    fn fetch_candles(&mut self, request: &CandleRequest) -> StoreResult<Vec<Candle>>;

    /// Top-ranked zones for a zone timeframe label. Unknown labels yield an empty list.
    fn fetch_zones(&mut self, symbol_id: SymbolId, timeframe_label: &str) -> StoreResult<Vec<Zone>>;

    /// Top-ranked price levels traded in `[start, end]`.
    fn fetch_volume_profile(
        &mut self,
        symbol_id: SymbolId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<VolumeProfileNode>>;
}

/// Opens market-data sessions.
pub trait Connect {
    type Session: MarketData;

    fn family(&self) -> InstrumentFamily;

    /// Open a new session.
    fn connect(&self) -> StoreResult<Self::Session>;
}
