//! Renderer-agnostic chart specifications and the four chart flavors.
//!
//! Everything here is pure: callers fetch candles, zones and volume profiles and
//! hand them in; the functions only lay them out.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use zone_store::models::{Candle, VolumeProfileNode, Zone, ZoneKind, sort_candles};

use crate::{
    selector::ChartTimeframe,
    style::{self, LineStyle, PALETTE, Palette, ZoneColors},
};

/// Which layout a [`ChartSpec`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    ZoneAlert,
    ZoneWithTargets,
    PriceAction,
    Dashboard,
}

/// Horizontal reference line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLine {
    pub price: f64,
    pub label: String,
    pub color: &'static str,
    pub style: LineStyle,
    pub width: u8,
}

impl PriceLine {
    fn new(price: f64, label: impl Into<String>, color: &'static str, style: LineStyle) -> Self {
        Self {
            price,
            label: label.into(),
            color,
            style,
            width: 2,
        }
    }
}

/// Zone rectangle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneOverlay {
    pub id: Option<i64>,
    pub kind: ZoneKind,
    pub top: f64,
    pub bottom: f64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    /// Open-ended zones extend to the last candle.
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub is_broken: bool,
    #[serde(flatten)]
    pub colors: ZoneColors,
}

impl ZoneOverlay {
    /// Active zone drawn from caller-supplied bounds.
    pub fn highlight(kind: ZoneKind, top: f64, bottom: f64, formed_at: DateTime<Utc>) -> Self {
        let (top, bottom) = if top >= bottom { (top, bottom) } else { (bottom, top) };
        Self {
            id: None,
            kind,
            top,
            bottom,
            start_time: formed_at,
            end_time: None,
            score: None,
            is_broken: false,
            colors: style::zone_colors(kind, false),
        }
    }
}

impl From<&Zone> for ZoneOverlay {
    fn from(z: &Zone) -> Self {
        Self {
            id: Some(z.id),
            kind: z.kind,
            top: z.top,
            bottom: z.bottom,
            start_time: z.start_time,
            end_time: z.end_time,
            score: Some(z.score),
            is_broken: z.is_broken,
            colors: style::zone_colors(z.kind, z.is_broken),
        }
    }
}

/// Everything drawn for one timeframe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeframeBucket {
    /// Bar interval, when known.
    pub minutes: Option<u32>,
    pub candles: Vec<Candle>,
    pub formation_candles: Vec<Candle>,
    pub zones: Vec<ZoneOverlay>,
    pub volume_profile: Vec<VolumeProfileNode>,
    /// Set when this timeframe could not be fetched and is shown empty.
    pub placeholder: bool,
}

impl TimeframeBucket {
    /// Dashboard bucket from fetched data, active zones first.
    pub fn populated(
        minutes: u32,
        candles: Vec<Candle>,
        zones: &[Zone],
        volume_profile: Vec<VolumeProfileNode>,
    ) -> Self {
        let (active, broken) = zone_store::models::partition_zones(zones);
        Self {
            minutes: Some(minutes),
            candles,
            formation_candles: Vec::new(),
            zones: active
                .into_iter()
                .chain(broken)
                .map(ZoneOverlay::from)
                .collect(),
            volume_profile,
            placeholder: false,
        }
    }

    /// Empty stand-in for a timeframe whose fetch failed.
    pub fn placeholder(minutes: u32) -> Self {
        Self {
            minutes: Some(minutes),
            placeholder: true,
            ..Self::default()
        }
    }
}

/// One renderable chart.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub symbol: String,
    /// Instrument family label (e.g. `STOCKS`).
    pub market_type: String,
    pub flavor: Flavor,
    pub title: String,
    /// Buckets keyed by timeframe label, in display order.
    pub timeframes: IndexMap<String, TimeframeBucket>,
    /// Reference lines drawn on the first bucket.
    pub lines: Vec<PriceLine>,
    pub palette: Palette,
}

impl ChartSpec {
    fn new(symbol: &str, market_type: &str, flavor: Flavor, title: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            market_type: market_type.to_string(),
            flavor,
            title,
            timeframes: IndexMap::new(),
            lines: Vec::new(),
            palette: PALETTE,
        }
    }

    /// First bucket, the one single-timeframe flavors draw.
    pub fn primary(&self) -> Option<&TimeframeBucket> {
        self.timeframes.values().next()
    }
}

/// How far `price` has pushed beyond a zone, as a percentage of its height.
///
/// Demand: `(bottom - price) / height * 100`; supply: `(price - top) / height * 100`;
/// clamped at zero. A zone with no height reports zero.
pub fn penetration_pct(kind: ZoneKind, top: f64, bottom: f64, price: f64) -> f64 {
    let (top, bottom) = if top >= bottom { (top, bottom) } else { (bottom, top) };
    let height = top - bottom;
    if height <= 0.0 || !height.is_finite() {
        return 0.0;
    }
    let raw = match kind {
        ZoneKind::Demand => (bottom - price) / height * 100.0,
        ZoneKind::Supply => (price - top) / height * 100.0,
    };
    // NaN (non-finite price) also lands on zero.
    raw.max(0.0)
}

/// Inputs of a zone-alert chart.
#[derive(Debug, Clone)]
pub struct ZoneAlert {
    pub symbol: String,
    pub kind: ZoneKind,
    pub top: f64,
    pub bottom: f64,
    /// Timeframe the zone was detected on.
    pub zone_minutes: u32,
    pub formed_at: DateTime<Utc>,
    pub current_price: f64,
    pub now: DateTime<Utc>,
    /// Candles that formed the zone, highlighted when present.
    pub formation_candles: Vec<Candle>,
}

/// Inputs of a zone-with-targets chart. Candles and levels are supplied by the caller.
#[derive(Debug, Clone)]
pub struct ZoneSetup {
    pub symbol: String,
    pub kind: ZoneKind,
    pub top: f64,
    pub bottom: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub target: f64,
    pub candles: Vec<Candle>,
    pub volume_profile: Vec<VolumeProfileNode>,
    pub current_price: f64,
    pub formed_at: DateTime<Utc>,
}

/// Single zone on its chart timeframe with a current-price line showing penetration.
pub fn zone_alert(
    alert: &ZoneAlert,
    market_type: &str,
    chart_tf: &ChartTimeframe,
    candles: Vec<Candle>,
) -> ChartSpec {
    let title = format!(
        "{} {} zone ({}min) on {}",
        alert.symbol,
        alert.kind.as_str().to_uppercase(),
        alert.zone_minutes,
        chart_tf.label
    );
    let mut formation_candles = alert.formation_candles.clone();
    sort_candles(&mut formation_candles);
    let mut spec = ChartSpec::new(&alert.symbol, market_type, Flavor::ZoneAlert, title);
    spec.timeframes.insert(
        chart_tf.label.clone(),
        TimeframeBucket {
            minutes: Some(chart_tf.timeframe.minutes()),
            candles,
            formation_candles,
            zones: vec![ZoneOverlay::highlight(
                alert.kind,
                alert.top,
                alert.bottom,
                alert.formed_at,
            )],
            ..TimeframeBucket::default()
        },
    );
    let pen = penetration_pct(alert.kind, alert.top, alert.bottom, alert.current_price);
    spec.lines.push(PriceLine::new(
        alert.current_price,
        format!("Current {:.2} ({pen:.1}% penetration)", alert.current_price),
        style::CURRENT_ALERT,
        LineStyle::Dashed,
    ));
    spec
}

/// Zone alert layout plus entry, stop, target and volume-profile levels.
pub fn zone_with_targets(setup: &ZoneSetup, market_type: &str) -> ChartSpec {
    let title = format!(
        "{} {} zone setup",
        setup.symbol,
        setup.kind.as_str().to_uppercase()
    );
    let mut spec = ChartSpec::new(&setup.symbol, market_type, Flavor::ZoneWithTargets, title);
    spec.timeframes.insert(
        "setup".into(),
        TimeframeBucket {
            candles: setup.candles.clone(),
            zones: vec![ZoneOverlay::highlight(
                setup.kind,
                setup.top,
                setup.bottom,
                setup.formed_at,
            )],
            volume_profile: setup.volume_profile.clone(),
            ..TimeframeBucket::default()
        },
    );

    for node in &setup.volume_profile {
        if node.is_hvn {
            let mut line = PriceLine::new(node.price, "HVN", style::HVN, LineStyle::Dotted);
            line.width = 1;
            spec.lines.push(line);
        } else if node.is_lvn {
            let mut line = PriceLine::new(node.price, "LVN", style::LVN, LineStyle::Dotted);
            line.width = 1;
            spec.lines.push(line);
        }
    }
    spec.lines.extend([
        PriceLine::new(
            setup.entry,
            format!("Entry {:.2}", setup.entry),
            style::ENTRY,
            LineStyle::Solid,
        ),
        PriceLine::new(
            setup.stop_loss,
            format!("Stop {:.2}", setup.stop_loss),
            style::STOP,
            LineStyle::Dashed,
        ),
        PriceLine::new(setup.target, "Target (3:1)", style::TARGET, LineStyle::Dashed),
        PriceLine::new(
            setup.current_price,
            format!("Current {:.2}", setup.current_price),
            style::CURRENT_SETUP,
            LineStyle::Dotted,
        ),
    ]);
    spec
}

/// Candles and volume with a line at the last close.
pub fn price_action(
    symbol: &str,
    market_type: &str,
    label: &str,
    minutes: u32,
    candles: Vec<Candle>,
) -> ChartSpec {
    let title = format!("{symbol} price action ({label})");
    let mut spec = ChartSpec::new(symbol, market_type, Flavor::PriceAction, title);
    if let Some(last) = candles.last() {
        spec.lines.push(PriceLine::new(
            last.close,
            format!("Last {:.2}", last.close),
            style::CURRENT_PRICE_ACTION,
            LineStyle::Dashed,
        ));
    }
    spec.timeframes.insert(
        label.to_string(),
        TimeframeBucket {
            minutes: Some(minutes),
            candles,
            ..TimeframeBucket::default()
        },
    );
    spec
}

/// Multi-timeframe dashboard from already-fetched buckets.
pub fn dashboard(
    symbol: &str,
    market_type: &str,
    buckets: IndexMap<String, TimeframeBucket>,
) -> ChartSpec {
    let title = format!("{symbol} {market_type} dashboard");
    let mut spec = ChartSpec::new(symbol, market_type, Flavor::Dashboard, title);
    spec.timeframes = buckets;
    spec
}
