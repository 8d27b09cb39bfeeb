//! Postgres (TimescaleDB) market-data session.
//!
//! Table and view names are interpolated from validated configuration only;
//! every caller-supplied value is bound.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::{
    Connection, OptionalExtension, PgConnection, RunQueryDsl, sql_query,
    sql_types::{BigInt, Date, Integer, Text, Timestamptz},
};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_secret_env_var;
use tracing::{debug, info, warn};

use super::{
    Connect, MarketData,
    rows::{CandleRow, IdRow, PresentRow, ProfileWindow, SymbolRow, VolumeNodeRow, ZoneRow},
};
use crate::{
    config::{AppConfig, FamilyCfg, InstrumentFamily, MarketHours},
    error::{StoreError, StoreResult},
    models::{
        Candle, SymbolId, VolumeProfileNode, Zone, ZoneKind, rank_volume_profile, rank_zones,
        sort_candles,
    },
    source::{Aggregation, CandleRequest, CandleSource},
};

/// Environment variable holding the Postgres connection URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Everything a session needs besides its connection. Shared by all sessions of a connector.
#[derive(Debug)]
struct SessionLayout {
    url: SecretString,
    family: InstrumentFamily,
    tables: FamilyCfg,
    timeframes_table: String,
    zone_limit: usize,
    volume_profile_limit: usize,
    hours: MarketHours,
}

/// Opens [`PgMarketData`] sessions for one instrument family.
#[derive(Debug)]
pub struct PgConnector {
    layout: Arc<SessionLayout>,
}

impl PgConnector {
    pub fn new(
        cfg: &AppConfig,
        family: InstrumentFamily,
        database_url: SecretString,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            layout: Arc::new(SessionLayout {
                url: database_url,
                family,
                tables: cfg.family(family).clone(),
                timeframes_table: cfg.timeframes_table.clone(),
                zone_limit: cfg.chart.zone_limit,
                volume_profile_limit: cfg.chart.volume_profile_limit,
                hours: cfg.market.hours()?,
            }),
        })
    }

    /// Same as [`PgConnector::new`] with the URL taken from `DATABASE_URL`.
    pub fn from_env(cfg: &AppConfig, family: InstrumentFamily) -> anyhow::Result<Self> {
        let url = get_secret_env_var(DATABASE_URL_ENV)?;
        Self::new(cfg, family, url)
    }
}

impl Connect for PgConnector {
    type Session = PgMarketData;

    fn family(&self) -> InstrumentFamily {
        self.layout.family
    }

    fn connect(&self) -> StoreResult<PgMarketData> {
        let conn = PgConnection::establish(self.layout.url.expose_secret())?;
        debug!(family = ?self.layout.family, "market-data session opened");
        Ok(PgMarketData {
            conn,
            layout: Arc::clone(&self.layout),
        })
    }
}

/// One open Postgres session. Dropping it closes the connection.
pub struct PgMarketData {
    conn: PgConnection,
    layout: Arc<SessionLayout>,
}

impl Drop for PgMarketData {
    fn drop(&mut self) {
        debug!(family = ?self.layout.family, "market-data session closed");
    }
}

pub(crate) fn symbol_id_sql(symbols_table: &str) -> String {
    format!("SELECT id::int8 AS id FROM {symbols_table} WHERE symbol = $1 LIMIT 1")
}

pub(crate) fn list_symbols_sql(symbols_table: &str) -> String {
    format!("SELECT DISTINCT symbol::text AS symbol FROM {symbols_table} ORDER BY symbol")
}

pub(crate) const VIEW_EXISTS_SQL: &str = "SELECT EXISTS (\
     SELECT 1 FROM pg_matviews WHERE schemaname = $1 AND matviewname = $2\
     ) AS present";

pub(crate) fn timeframe_id_sql(timeframes_table: &str) -> String {
    format!("SELECT id::int8 AS id FROM {timeframes_table} WHERE label = $1 LIMIT 1")
}

/// Binds: symbol id, timeframe id, limit.
///
/// Rows of an unrecognized `zone_type` are excluded before `LIMIT` applies.
pub(crate) fn zones_sql(zones_table: &str) -> String {
    format!(
        "SELECT zone_id::int8 AS zone_id, zone_type::text AS zone_type, \
         COALESCE(bottom_price, 0)::float8 AS bottom_price, \
         COALESCE(top_price, 0)::float8 AS top_price, \
         start_time::timestamptz AS start_time, end_time::timestamptz AS end_time, \
         COALESCE(zone_score, 0)::float8 AS zone_score, \
         COALESCE(is_broken, false) AS is_broken \
         FROM {zones_table} \
         WHERE symbol_id = $1 AND timeframe_id = $2 \
         AND lower(trim(zone_type::text)) IN ('supply', 'demand') \
         ORDER BY zone_score DESC, start_time DESC \
         LIMIT $3"
    )
}

/// Binds: symbol id, window start, window end, limit.
pub(crate) fn volume_profile_sql(table: &str, column: &str) -> String {
    format!(
        "SELECT price_level::float8 AS price, \
         COALESCE(SUM(volume), 0)::float8 AS total_volume, \
         COALESCE(BOOL_OR(node_type = 'HVN'), false) AS is_hvn, \
         COALESCE(BOOL_OR(node_type = 'LVN'), false) AS is_lvn \
         FROM {table} \
         WHERE symbol_id = $1 AND {column} >= $2 AND {column} <= $3 \
         GROUP BY price_level \
         ORDER BY total_volume DESC \
         LIMIT $4"
    )
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl PgMarketData {
    fn tables(&self) -> &FamilyCfg {
        &self.layout.tables
    }

    /// Whether `schema.view` is a materialized view. A failed lookup counts as absent.
    fn view_exists(&mut self, view: &str) -> bool {
        let schema = self.layout.tables.schema.clone();
        let lookup = sql_query(VIEW_EXISTS_SQL)
            .bind::<Text, _>(&schema)
            .bind::<Text, _>(view)
            .get_result::<PresentRow>(&mut self.conn);
        match lookup {
            Ok(row) => row.present,
            Err(error) => {
                warn!(%schema, %view, %error, "view lookup failed; using base table");
                false
            }
        }
    }

    fn timeframe_id(&mut self, label: &str) -> StoreResult<Option<i64>> {
        let target = self.layout.timeframes_table.clone();
        Ok(sql_query(timeframe_id_sql(&target))
            .bind::<Text, _>(label)
            .get_result::<IdRow>(&mut self.conn)
            .optional()
            .map_err(StoreError::query(target))?
            .map(|r| r.id))
    }

    fn zone_from_row(&self, row: ZoneRow) -> Option<Zone> {
        let kind = match row.zone_type.parse::<ZoneKind>() {
            Ok(kind) => kind,
            Err(error) => {
                warn!(zone_id = row.zone_id, %error, "skipping zone");
                return None;
            }
        };
        Some(
            Zone {
                id: row.zone_id,
                kind,
                top: row.top_price,
                bottom: row.bottom_price,
                start_time: row.start_time,
                end_time: row.end_time,
                score: row.zone_score,
                is_broken: row.is_broken,
            }
            .normalized(),
        )
    }
}

impl MarketData for PgMarketData {
    fn family(&self) -> InstrumentFamily {
        self.layout.family
    }

    fn resolve_symbol(&mut self, ticker: &str) -> StoreResult<Option<SymbolId>> {
        let target = self.tables().qualified(&self.tables().symbols_table);
        let id = sql_query(symbol_id_sql(&target))
            .bind::<Text, _>(ticker)
            .get_result::<IdRow>(&mut self.conn)
            .optional()
            .map_err(StoreError::query(target))?
            .map(|r| r.id);
        if id.is_none() {
            debug!(ticker, family = ?self.layout.family, "symbol not found");
        }
        Ok(id)
    }

    fn list_symbols(&mut self) -> StoreResult<Vec<String>> {
        let target = self.tables().qualified(&self.tables().symbols_table);
        let rows = sql_query(list_symbols_sql(&target))
            .load::<SymbolRow>(&mut self.conn)
            .map_err(StoreError::query(target))?;
        Ok(rows.into_iter().map(|r| r.symbol).collect())
    }

    fn fetch_candles(&mut self, req: &CandleRequest) -> StoreResult<Vec<Candle>> {
        let view = self.tables().view_name(req.timeframe);
        let exists = self.view_exists(&view);
        let source = CandleSource::select(self.tables(), req.timeframe, exists);
        let start = req.effective_start(&self.layout.hours);
        let sql = source.sql();
        debug!(
            symbol_id = req.symbol_id,
            timeframe = %req.timeframe,
            source = source.target(),
            %start,
            end = %req.end,
            "fetching candles"
        );

        let loaded = match &source {
            CandleSource::View(_) => sql_query(sql)
                .bind::<BigInt, _>(req.symbol_id)
                .bind::<Timestamptz, _>(start)
                .bind::<Timestamptz, _>(req.end)
                .load::<CandleRow>(&mut self.conn),
            CandleSource::OnTheFly {
                aggregation: Aggregation::StrideSample,
                ..
            } => {
                let minutes = i32::try_from(req.timeframe.minutes()).unwrap_or(i32::MAX);
                sql_query(sql)
                    .bind::<BigInt, _>(req.symbol_id)
                    .bind::<Timestamptz, _>(start)
                    .bind::<Timestamptz, _>(req.end)
                    .bind::<Integer, _>(minutes)
                    .load::<CandleRow>(&mut self.conn)
            }
            CandleSource::OnTheFly {
                aggregation: Aggregation::Bucketed,
                ..
            } => sql_query(sql)
                .bind::<Text, _>(req.timeframe.pg_interval())
                .bind::<BigInt, _>(req.symbol_id)
                .bind::<Timestamptz, _>(start)
                .bind::<Timestamptz, _>(req.end)
                .load::<CandleRow>(&mut self.conn),
        };
        let rows = loaded.map_err(StoreError::query(source.target()))?;

        let mut candles: Vec<Candle> = rows.into_iter().map(Candle::from).collect();
        sort_candles(&mut candles);
        info!(
            symbol_id = req.symbol_id,
            timeframe = %req.timeframe,
            source = source.target(),
            count = candles.len(),
            "candles fetched"
        );
        Ok(candles)
    }

    fn fetch_zones(&mut self, symbol_id: SymbolId, timeframe_label: &str) -> StoreResult<Vec<Zone>> {
        let Some(timeframe_id) = self.timeframe_id(timeframe_label)? else {
            warn!(symbol_id, timeframe = timeframe_label, "unknown zone timeframe label");
            return Ok(Vec::new());
        };
        let target = self.tables().qualified(&self.tables().zones_table);
        let limit = self.layout.zone_limit;
        let rows = sql_query(zones_sql(&target))
            .bind::<BigInt, _>(symbol_id)
            .bind::<BigInt, _>(timeframe_id)
            .bind::<BigInt, _>(limit_param(limit))
            .load::<ZoneRow>(&mut self.conn)
            .map_err(StoreError::query(target))?;

        let zones: Vec<Zone> = rows.into_iter().filter_map(|r| self.zone_from_row(r)).collect();
        let zones = rank_zones(zones, limit);
        let active = zones.iter().filter(|z| z.is_active()).count();
        info!(
            symbol_id,
            timeframe = timeframe_label,
            active,
            broken = zones.len() - active,
            "zones fetched"
        );
        Ok(zones)
    }

    fn fetch_volume_profile(
        &mut self,
        symbol_id: SymbolId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<VolumeProfileNode>> {
        let window = match self.layout.family {
            InstrumentFamily::Stocks => ProfileWindow::Timestamps { start, end },
            InstrumentFamily::Crypto => ProfileWindow::Dates {
                start: start.date_naive(),
                end: end.date_naive(),
            },
        };
        let target = self.tables().qualified(&self.tables().volume_profile_table);
        let sql = volume_profile_sql(&target, window.column());
        let limit = self.layout.volume_profile_limit;
        let query = sql_query(sql).bind::<BigInt, _>(symbol_id);
        let loaded = match window {
            ProfileWindow::Timestamps { start, end } => query
                .bind::<Timestamptz, _>(start)
                .bind::<Timestamptz, _>(end)
                .bind::<BigInt, _>(limit_param(limit))
                .load::<VolumeNodeRow>(&mut self.conn),
            ProfileWindow::Dates { start, end } => query
                .bind::<Date, _>(start)
                .bind::<Date, _>(end)
                .bind::<BigInt, _>(limit_param(limit))
                .load::<VolumeNodeRow>(&mut self.conn),
        };
        let rows = loaded.map_err(StoreError::query(target))?;
        let nodes = rank_volume_profile(rows.into_iter().map(VolumeProfileNode::from).collect(), limit);
        debug!(symbol_id, levels = nodes.len(), "volume profile fetched");
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_query_ranks_and_limits_in_sql() {
        let sql = zones_sql("stocks.zones");
        assert!(sql.contains("FROM stocks.zones"));
        assert!(sql.contains("ORDER BY zone_score DESC, start_time DESC"));
        assert!(sql.ends_with("LIMIT $3"));
    }

    #[test]
    fn zones_query_filters_kind_before_limit() {
        let sql = zones_sql("stocks.zones");
        let filter = sql
            .find("lower(trim(zone_type::text)) IN ('supply', 'demand')")
            .unwrap();
        assert!(filter < sql.find("LIMIT $3").unwrap());
    }

    #[test]
    fn volume_profile_query_uses_family_column() {
        let stocks = volume_profile_sql("stocks.volume_profile", "period_start");
        assert!(stocks.contains("period_start >= $2 AND period_start <= $3"));
        let crypto = volume_profile_sql("crypto.volume_profile", "\"date\"");
        assert!(crypto.contains("\"date\" >= $2"));
        assert!(crypto.contains("GROUP BY price_level"));
    }

    #[test]
    fn lookups_bind_values() {
        assert_eq!(
            symbol_id_sql("crypto.symbols"),
            "SELECT id::int8 AS id FROM crypto.symbols WHERE symbol = $1 LIMIT 1"
        );
        assert!(timeframe_id_sql("shared.timeframes").contains("WHERE label = $1"));
        assert!(VIEW_EXISTS_SQL.contains("matviewname = $2"));
    }

    #[test]
    fn connector_uses_family_layout() {
        let cfg = AppConfig::default();
        let conn =
            PgConnector::new(&cfg, InstrumentFamily::Crypto, SecretString::from("postgres://x".to_string())).unwrap();
        assert_eq!(conn.family(), InstrumentFamily::Crypto);
        assert_eq!(conn.layout.tables.schema, "crypto");
        assert_eq!(conn.layout.zone_limit, 30);
    }
}
