//! Round trip against a live Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -p zone_store -- --ignored`.

mod common;

use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use serial_test::serial;
use zone_store::{
    Connect, MarketData,
    config::InstrumentFamily,
    market::PgConnector,
    models::ZoneKind,
    source::{CandleRequest, StartPadding},
    timeframe::Timeframe,
};

fn connector() -> Option<PgConnector> {
    let url = common::database_url()?;
    common::seed(&url);
    let cfg = common::test_config();
    Some(PgConnector::new(&cfg, InstrumentFamily::Stocks, SecretString::from(url)).unwrap())
}

fn request(minutes: u32) -> CandleRequest {
    CandleRequest {
        symbol_id: 1,
        timeframe: Timeframe::from_minutes(minutes).unwrap(),
        start: Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2025, 1, 15, 16, 29, 0).unwrap(),
        padding: StartPadding::Exact,
    }
}

#[test]
#[ignore]
#[serial]
fn resolves_and_lists_symbols() {
    let Some(conn) = connector() else { return };
    let mut session = conn.connect().unwrap();
    assert_eq!(session.resolve_symbol("AAPL").unwrap(), Some(1));
    assert_eq!(session.resolve_symbol("ZZZZ").unwrap(), None);
    assert_eq!(session.list_symbols().unwrap(), vec!["AAPL", "MSFT"]);
}

#[test]
#[ignore]
#[serial]
fn candles_come_from_view_when_present() {
    let Some(conn) = connector() else { return };
    let mut session = conn.connect().unwrap();
    let candles = session.fetch_candles(&request(60)).unwrap();
    // 14:00, 15:00 and 16:00 hourly buckets; the first one is partial.
    assert_eq!(candles.len(), 3);
    assert_eq!(candles[0].open, 100.0);
    assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
#[ignore]
#[serial]
fn small_timeframes_stride_sample_the_base_table() {
    let Some(conn) = connector() else { return };
    let mut session = conn.connect().unwrap();
    let candles = session.fetch_candles(&request(5)).unwrap();
    assert_eq!(candles.len(), 24);
    assert_eq!(candles[0].volume, 0.0, "null volume is coalesced");
    assert!(candles.iter().all(|c| c.timestamp.timestamp() % 300 == 0));
}

#[test]
#[ignore]
#[serial]
fn zones_are_ranked_normalized_and_filtered() {
    let Some(conn) = connector() else { return };
    let mut session = conn.connect().unwrap();
    let zones = session.fetch_zones(1, "30min").unwrap();
    let ids: Vec<i64> = zones.iter().map(|z| z.id).collect();
    assert_eq!(ids, vec![11, 10]);
    assert_eq!(zones[0].kind, ZoneKind::Supply);
    assert_eq!((zones[0].top, zones[0].bottom), (162.0, 160.0));
    assert!(zones[0].is_broken);

    assert!(session.fetch_zones(1, "7min").unwrap().is_empty());
}

#[test]
#[ignore]
#[serial]
fn volume_profile_groups_levels_in_window() {
    let Some(conn) = connector() else { return };
    let mut session = conn.connect().unwrap();
    let nodes = session
        .fetch_volume_profile(
            1,
            Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!((nodes[0].price, nodes[0].volume), (100.0, 1200.0));
    assert!(nodes[0].is_hvn && !nodes[0].is_lvn);
    assert!(nodes[1].is_lvn);
}
