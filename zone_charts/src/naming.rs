//! Output names: `<symbol>_<variant>_<timeframe>_<YYYYmmdd_HHMMSS>.<ext>`.

use chrono::{DateTime, Utc};
use zone_store::models::ZoneKind;

/// The two kinds of rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Html,
    Png,
}

impl OutputKind {
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Html => "html",
            OutputKind::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputKind::Html => "text/html; charset=utf-8",
            OutputKind::Png => "image/png",
        }
    }
}

/// Make a ticker safe for file and blob names (`BTC/USD` -> `BTC_USD`).
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol.trim().replace([':', '/'], "_")
}

/// `<symbol>_<variant>_<timeframe>_<timestamp>` without extension.
pub fn stem(symbol: &str, variant: &str, timeframe: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}_{variant}_{timeframe}_{}",
        sanitize_symbol(symbol),
        at.format("%Y%m%d_%H%M%S")
    )
}

pub fn zone_alert_stem(symbol: &str, kind: ZoneKind, zone_minutes: u32, at: DateTime<Utc>) -> String {
    stem(symbol, kind.as_str(), &format!("{zone_minutes}min"), at)
}

pub fn zone_setup_stem(symbol: &str, kind: ZoneKind, at: DateTime<Utc>) -> String {
    stem(symbol, &format!("{kind}_with_targets"), "setup", at)
}

pub fn price_action_stem(symbol: &str, timeframe_label: &str, at: DateTime<Utc>) -> String {
    stem(symbol, "price_action", timeframe_label, at)
}

/// Dashboards are prefixed with the family schema and use a lower-cased symbol.
pub fn dashboard_stem(schema: &str, symbol: &str, at: DateTime<Utc>) -> String {
    stem(
        &format!("{schema}_{}", symbol.to_lowercase()),
        "dashboard",
        "multi",
        at,
    )
}

pub fn file_name(stem: &str, kind: OutputKind) -> String {
    format!("{stem}.{}", kind.extension())
}
