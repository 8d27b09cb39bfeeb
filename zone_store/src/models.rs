//! Read-only market records fetched from the database.
//!
//! These are produced upstream (materialized views, zone detection, volume
//! profile jobs); this crate only reads, normalizes, and ranks them. Serialized
//! field names and Unix-second timestamps match what the chart templates expect.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Internal numeric symbol identifier.
pub type SymbolId = i64;

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    /// Bar open time (UTC), serialized as Unix seconds.
    #[serde(rename = "time", with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Close at or above open.
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// Sort candles by timestamp, keeping the fetch order for equal timestamps.
pub fn sort_candles(candles: &mut [Candle]) {
    candles.sort_by_key(|c| c.timestamp);
}

/// Supply (resistance-like) or demand (support-like) zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Supply,
    Demand,
}

impl ZoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneKind::Supply => "supply",
            ZoneKind::Demand => "demand",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized zone type string.
#[derive(Debug, thiserror::Error)]
#[error("unknown zone type: {0:?}")]
pub struct UnknownZoneKind(pub String);

impl FromStr for ZoneKind {
    type Err = UnknownZoneKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supply" => Ok(ZoneKind::Supply),
            "demand" => Ok(ZoneKind::Demand),
            _ => Err(UnknownZoneKind(s.to_string())),
        }
    }
}

/// A detected price band with its strength score and broken/active status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    #[serde(rename = "zone_id")]
    pub id: i64,
    #[serde(rename = "zone_type")]
    pub kind: ZoneKind,
    #[serde(rename = "top_price")]
    pub top: f64,
    #[serde(rename = "bottom_price")]
    pub bottom: f64,
    /// Formation start, Unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    /// Formation end, Unix seconds; `null` while still forming.
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "zone_score")]
    pub score: f64,
    pub is_broken: bool,
}

impl Zone {
    /// Enforce `top >= bottom` by swapping inverted bounds.
    pub fn normalized(mut self) -> Self {
        if self.top < self.bottom {
            std::mem::swap(&mut self.top, &mut self.bottom);
        }
        self
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn is_active(&self) -> bool {
        !self.is_broken
    }
}

/// Rank zones by score descending, then start time descending, and keep the first `limit`.
pub fn rank_zones(mut zones: Vec<Zone>, limit: usize) -> Vec<Zone> {
    zones.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.start_time.cmp(&a.start_time))
    });
    zones.truncate(limit);
    zones
}

/// Split into (active, broken), preserving rank order within each side.
pub fn partition_zones(zones: &[Zone]) -> (Vec<&Zone>, Vec<&Zone>) {
    zones.iter().partition(|z| z.is_active())
}

/// Aggregated traded volume at one price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeProfileNode {
    pub price: f64,
    pub volume: f64,
    /// High-volume node.
    pub is_hvn: bool,
    /// Low-volume node.
    pub is_lvn: bool,
}

/// Rank levels by volume descending and keep the first `limit`.
pub fn rank_volume_profile(mut nodes: Vec<VolumeProfileNode>, limit: usize) -> Vec<VolumeProfileNode> {
    nodes.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    nodes.truncate(limit);
    nodes
}
