#![allow(dead_code)]

use diesel::{Connection, PgConnection, connection::SimpleConnection};
use zone_store::config::AppConfig;

/// Throwaway schema owned by the integration tests.
pub const SCHEMA: &str = "zone_store_it";

/// `DATABASE_URL`, when the environment provides one.
pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty())
}

/// Default config pointed at [`SCHEMA`] for the stocks family.
pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.families.stocks.schema = SCHEMA.into();
    cfg.timeframes_table = format!("{SCHEMA}.timeframes");
    cfg
}

/// Recreate [`SCHEMA`] with two hours of 1-minute bars for `AAPL`
/// (2025-01-15 14:30Z onwards), an hourly materialized view, three zones, and a
/// small volume profile.
pub fn seed(url: &str) -> PgConnection {
    let mut conn = PgConnection::establish(url).expect("connect");
    conn.batch_execute(&format!(
        r#"
        DROP SCHEMA IF EXISTS {s} CASCADE;
        CREATE SCHEMA {s};

        CREATE TABLE {s}.symbols (id integer PRIMARY KEY, symbol text NOT NULL);
        INSERT INTO {s}.symbols VALUES (1, 'AAPL'), (2, 'MSFT');

        CREATE TABLE {s}.minute_aggregates (
            symbol_id integer NOT NULL,
            "timestamp" timestamptz NOT NULL,
            open numeric, high numeric, low numeric, close numeric, volume bigint
        );
        INSERT INTO {s}.minute_aggregates
        SELECT 1,
               timestamptz '2025-01-15 14:30:00+00' + n * interval '1 minute',
               100 + n, 101 + n, 99 + n, 100.5 + n,
               CASE WHEN n = 0 THEN NULL ELSE 1000 END
        FROM generate_series(0, 119) AS n;

        CREATE MATERIALIZED VIEW {s}.candles_60m AS
        SELECT symbol_id,
               date_trunc('hour', "timestamp") AS bucket,
               (array_agg(open ORDER BY "timestamp"))[1] AS open,
               max(high) AS high,
               min(low) AS low,
               (array_agg(close ORDER BY "timestamp" DESC))[1] AS close,
               sum(volume) AS volume
        FROM {s}.minute_aggregates
        GROUP BY 1, 2;

        CREATE TABLE {s}.timeframes (id integer PRIMARY KEY, label text NOT NULL);
        INSERT INTO {s}.timeframes VALUES (1, '30min');

        CREATE TABLE {s}.zones (
            zone_id bigint, symbol_id integer, timeframe_id integer, zone_type text,
            top_price numeric, bottom_price numeric,
            start_time timestamptz, end_time timestamptz,
            zone_score numeric, is_broken boolean
        );
        INSERT INTO {s}.zones VALUES
            (10, 1, 1, 'demand', 150.5, 149.0, '2025-01-10 15:00+00', NULL, 8.5, false),
            (11, 1, 1, 'supply', 160.0, 162.0, '2025-01-12 15:00+00', '2025-01-12 16:00+00', 8.5, true),
            (12, 1, 1, 'sideways', 1, 0, '2025-01-13 15:00+00', NULL, 9.9, false);

        CREATE TABLE {s}.volume_profile (
            symbol_id integer, period_start timestamptz, price_level numeric,
            volume bigint, node_type text
        );
        INSERT INTO {s}.volume_profile VALUES
            (1, '2025-01-15 00:00+00', 100.0, 500, 'HVN'),
            (1, '2025-01-15 00:00+00', 101.0, 50, 'LVN'),
            (1, '2025-01-16 00:00+00', 100.0, 700, 'HVN'),
            (1, '2025-02-20 00:00+00', 120.0, 9999, 'HVN');
        "#,
        s = SCHEMA
    ))
    .expect("seed schema");
    conn
}
