//! Raw rows returned by the hand-written queries in `pg.rs`.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    QueryableByName,
    sql_types::{BigInt, Bool, Double, Nullable, Text, Timestamptz},
};

use crate::models::{Candle, VolumeProfileNode};

#[derive(QueryableByName)]
pub(crate) struct IdRow {
    #[diesel(sql_type = BigInt)]
    pub(crate) id: i64,
}

#[derive(QueryableByName)]
pub(crate) struct SymbolRow {
    #[diesel(sql_type = Text)]
    pub(crate) symbol: String,
}

#[derive(QueryableByName)]
pub(crate) struct PresentRow {
    #[diesel(sql_type = Bool)]
    pub(crate) present: bool,
}

#[derive(QueryableByName)]
pub(crate) struct CandleRow {
    #[diesel(sql_type = Timestamptz)]
    ts: DateTime<Utc>,
    #[diesel(sql_type = Double)]
    open: f64,
    #[diesel(sql_type = Double)]
    high: f64,
    #[diesel(sql_type = Double)]
    low: f64,
    #[diesel(sql_type = Double)]
    close: f64,
    #[diesel(sql_type = Double)]
    volume: f64,
}

impl From<CandleRow> for Candle {
    fn from(r: CandleRow) -> Self {
        Candle {
            timestamp: r.ts,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        }
    }
}

#[derive(QueryableByName)]
pub(crate) struct ZoneRow {
    #[diesel(sql_type = BigInt)]
    pub(crate) zone_id: i64,
    #[diesel(sql_type = Text)]
    pub(crate) zone_type: String,
    #[diesel(sql_type = Double)]
    pub(crate) bottom_price: f64,
    #[diesel(sql_type = Double)]
    pub(crate) top_price: f64,
    #[diesel(sql_type = Timestamptz)]
    pub(crate) start_time: DateTime<Utc>,
    #[diesel(sql_type = Nullable<Timestamptz>)]
    pub(crate) end_time: Option<DateTime<Utc>>,
    #[diesel(sql_type = Double)]
    pub(crate) zone_score: f64,
    #[diesel(sql_type = Bool)]
    pub(crate) is_broken: bool,
}

#[derive(QueryableByName)]
pub(crate) struct VolumeNodeRow {
    #[diesel(sql_type = Double)]
    price: f64,
    #[diesel(sql_type = Double)]
    total_volume: f64,
    #[diesel(sql_type = Bool)]
    is_hvn: bool,
    #[diesel(sql_type = Bool)]
    is_lvn: bool,
}

impl From<VolumeNodeRow> for VolumeProfileNode {
    fn from(r: VolumeNodeRow) -> Self {
        VolumeProfileNode {
            price: r.price,
            volume: r.total_volume,
            is_hvn: r.is_hvn,
            is_lvn: r.is_lvn,
        }
    }
}

/// Volume-profile window, keyed the way each family stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProfileWindow {
    /// `period_start` timestamp column.
    Timestamps { start: DateTime<Utc>, end: DateTime<Utc> },
    /// `date` column (UTC calendar dates).
    Dates { start: NaiveDate, end: NaiveDate },
}

impl ProfileWindow {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            ProfileWindow::Timestamps { .. } => "period_start",
            ProfileWindow::Dates { .. } => "\"date\"",
        }
    }
}
