//! Candle source selection and query-window policy.
//!
//! A candle request is served either from the family's precomputed view for that
//! timeframe or, when the view does not exist, computed on the fly from the
//! minute-level base table. The on-the-fly path has two shapes:
//!
//! * up to [`STRIDE_SAMPLE_MAX_MINUTES`]: keep the base rows whose minute-of-hour
//!   is a multiple of the timeframe. This is a sampling of 1-minute bars, **not**
//!   a true OHLCV aggregation; the known inconsistency is kept for parity with
//!   charts already published.
//! * above it: `time_bucket` aggregation (first open, max high, min low, last
//!   close, summed volume).
//!
//! Everything here is pure; the database session only decides whether the view
//! exists and binds the values.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::{
    config::{FamilyCfg, MarketHours},
    timeframe::Timeframe,
    tz::{session_date, session_open_utc},
};

/// Largest timeframe served by stride sampling when no view exists.
pub const STRIDE_SAMPLE_MAX_MINUTES: u32 = 15;

/// How the on-the-fly path derives bars from the base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Keep 1-minute rows whose minute-of-hour is divisible by the timeframe.
    StrideSample,
    /// Bucket rows with `time_bucket` and aggregate OHLCV.
    Bucketed,
}

/// Where candles for one request come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandleSource {
    /// Schema-qualified precomputed view.
    View(String),
    /// Schema-qualified base table plus the aggregation applied to it.
    OnTheFly { table: String, aggregation: Aggregation },
}

impl CandleSource {
    /// Pick the source for `tf`, given whether its precomputed view exists.
    pub fn select(family: &FamilyCfg, tf: Timeframe, view_exists: bool) -> Self {
        if view_exists {
            return CandleSource::View(family.qualified(&family.view_name(tf)));
        }
        let aggregation = if tf.minutes() <= STRIDE_SAMPLE_MAX_MINUTES {
            Aggregation::StrideSample
        } else {
            Aggregation::Bucketed
        };
        CandleSource::OnTheFly {
            table: family.qualified(&family.base_table),
            aggregation,
        }
    }

    /// Table or view the query runs against.
    pub fn target(&self) -> &str {
        match self {
            CandleSource::View(view) => view,
            CandleSource::OnTheFly { table, .. } => table,
        }
    }

    /// Parameterized SQL for this source.
    ///
    /// Bind order:
    /// * `View`: symbol id, start, end
    /// * `StrideSample`: symbol id, start, end, minutes
    /// * `Bucketed`: interval, symbol id, start, end
    ///
    /// Every variant yields `ts, open, high, low, close, volume` in ascending time
    /// order with nulls coerced to zero.
    pub fn sql(&self) -> String {
        match self {
            CandleSource::View(view) => format!(
                "SELECT bucket::timestamptz AS ts, \
                 COALESCE(open, 0)::float8 AS open, \
                 COALESCE(high, 0)::float8 AS high, \
                 COALESCE(low, 0)::float8 AS low, \
                 COALESCE(close, 0)::float8 AS close, \
                 COALESCE(volume, 0)::float8 AS volume \
                 FROM {view} \
                 WHERE symbol_id = $1 AND bucket >= $2 AND bucket <= $3 \
                 ORDER BY bucket ASC"
            ),
            CandleSource::OnTheFly {
                table,
                aggregation: Aggregation::StrideSample,
            } => format!(
                "SELECT \"timestamp\"::timestamptz AS ts, \
                 COALESCE(open, 0)::float8 AS open, \
                 COALESCE(high, 0)::float8 AS high, \
                 COALESCE(low, 0)::float8 AS low, \
                 COALESCE(close, 0)::float8 AS close, \
                 COALESCE(volume, 0)::float8 AS volume \
                 FROM {table} \
                 WHERE symbol_id = $1 AND \"timestamp\" >= $2 AND \"timestamp\" <= $3 \
                 AND EXTRACT(MINUTE FROM \"timestamp\")::int % $4 = 0 \
                 ORDER BY \"timestamp\" ASC"
            ),
            CandleSource::OnTheFly {
                table,
                aggregation: Aggregation::Bucketed,
            } => format!(
                "SELECT time_bucket($1::interval, \"timestamp\")::timestamptz AS ts, \
                 COALESCE((array_agg(open ORDER BY \"timestamp\" ASC))[1], 0)::float8 AS open, \
                 COALESCE(MAX(high), 0)::float8 AS high, \
                 COALESCE(MIN(low), 0)::float8 AS low, \
                 COALESCE((array_agg(close ORDER BY \"timestamp\" DESC))[1], 0)::float8 AS close, \
                 COALESCE(SUM(volume), 0)::float8 AS volume \
                 FROM {table} \
                 WHERE symbol_id = $2 AND \"timestamp\" >= $3 AND \"timestamp\" <= $4 \
                 GROUP BY 1 \
                 ORDER BY 1 ASC"
            ),
        }
    }
}

/// Start-of-window policy for a candle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPadding {
    /// Widen the window for context (see [`padded_start`]).
    #[default]
    Context,
    /// Use the requested start as is.
    Exact,
}

/// Effective query start for a `[start, end]` request.
///
/// When both ends fall on the same market-local date, the start moves back to
/// that day's session open; a start already before the open is kept. Otherwise
/// it moves back by a tenth of the span. An empty or inverted span is returned
/// unchanged. The result is never later than `start`.
pub fn padded_start(start: DateTime<Utc>, end: DateTime<Utc>, hours: &MarketHours) -> DateTime<Utc> {
    let day = session_date(start, hours.tz);
    if day == session_date(end, hours.tz) {
        return match session_open_utc(day, hours) {
            Ok(open) => open.min(start),
            Err(error) => {
                warn!(%day, %error, "cannot resolve session open; keeping requested start");
                start
            }
        };
    }
    let span = end - start;
    if span <= Duration::zero() {
        return start;
    }
    start - span / 10
}

/// Candle request handed to a market-data session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleRequest {
    pub symbol_id: crate::models::SymbolId,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub padding: StartPadding,
}

impl CandleRequest {
    /// Window ending at `end` and reaching `lookback_days` back, without padding.
    pub fn lookback(
        symbol_id: crate::models::SymbolId,
        timeframe: Timeframe,
        end: DateTime<Utc>,
        lookback_days: u32,
    ) -> Self {
        Self {
            symbol_id,
            timeframe,
            start: end - Duration::days(i64::from(lookback_days)),
            end,
            padding: StartPadding::Exact,
        }
    }

    /// Start after applying the padding policy.
    pub fn effective_start(&self, hours: &MarketHours) -> DateTime<Utc> {
        match self.padding {
            StartPadding::Context => padded_start(self.start, self.end, hours),
            StartPadding::Exact => self.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FamilyCfg;
    use chrono::{NaiveTime, TimeZone};

    fn ny() -> MarketHours {
        MarketHours {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            tz: chrono_tz::America::New_York,
        }
    }

    fn tf(m: u32) -> Timeframe {
        Timeframe::from_minutes(m).unwrap()
    }

    #[test]
    fn existing_view_wins() {
        let src = CandleSource::select(&FamilyCfg::stocks(), tf(65), true);
        assert_eq!(src, CandleSource::View("stocks.candles_65m".into()));
        assert_eq!(src.target(), "stocks.candles_65m");
    }

    #[test]
    fn small_timeframes_fall_back_to_stride_sampling() {
        for m in [1, 3, 5, 15] {
            let src = CandleSource::select(&FamilyCfg::crypto(), tf(m), false);
            assert_eq!(
                src,
                CandleSource::OnTheFly {
                    table: "crypto.minute_aggregates".into(),
                    aggregation: Aggregation::StrideSample
                }
            );
        }
    }

    #[test]
    fn larger_timeframes_fall_back_to_buckets() {
        let src = CandleSource::select(&FamilyCfg::stocks(), tf(16), false);
        assert!(matches!(
            src,
            CandleSource::OnTheFly { aggregation: Aggregation::Bucketed, .. }
        ));
        assert!(src.sql().contains("time_bucket($1::interval"));
    }

    #[test]
    fn stride_sql_filters_on_minute_of_hour() {
        let sql = CandleSource::select(&FamilyCfg::stocks(), tf(5), false).sql();
        assert!(sql.contains("EXTRACT(MINUTE FROM \"timestamp\")::int % $4 = 0"));
        assert!(sql.contains("FROM stocks.minute_aggregates"));
    }

    #[test]
    fn view_sql_orders_ascending() {
        let sql = CandleSource::View("stocks.candles_5d".into()).sql();
        assert!(sql.contains("FROM stocks.candles_5d"));
        assert!(sql.ends_with("ORDER BY bucket ASC"));
    }

    #[test]
    fn single_day_clamps_to_open() {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 17, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 15, 20, 0, 0).unwrap();
        assert_eq!(
            padded_start(start, end, &ny()),
            Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap()
        );
    }

    #[test]
    fn pre_market_window_keeps_its_start() {
        // 07:00-09:00 New York, before the 09:30 open.
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 15, 14, 0, 0).unwrap();
        let got = padded_start(start, end, &ny());
        assert_eq!(got, start);
        assert!(got < end);
    }

    #[test]
    fn multi_day_pads_a_tenth() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
        assert_eq!(
            padded_start(start, end, &ny()),
            Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn inverted_window_is_left_alone() {
        let start = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(padded_start(start, end, &ny()), start);
    }

    #[test]
    fn lookback_requests_are_exact() {
        let end = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let req = CandleRequest::lookback(7, tf(60), end, 10);
        assert_eq!(req.start, Utc.with_ymd_and_hms(2025, 2, 19, 0, 0, 0).unwrap());
        assert_eq!(req.effective_start(&ny()), req.start);
    }
}
