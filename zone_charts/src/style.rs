//! Visual conventions shared by the HTML templates and the thumbnail rasterizer.

use serde::Serialize;
use zone_store::models::ZoneKind;

pub const UP: &str = "#26a69a";
pub const DOWN: &str = "#ef5350";

pub const SUPPLY_FILL: &str = "rgba(255, 82, 82, 0.2)";
pub const SUPPLY_BORDER: &str = "#FF5252";
pub const DEMAND_FILL: &str = "rgba(76, 175, 80, 0.2)";
pub const DEMAND_BORDER: &str = "#4CAF50";
pub const BROKEN_SUPPLY_FILL: &str = "rgba(255, 82, 82, 0.08)";
pub const BROKEN_DEMAND_FILL: &str = "rgba(76, 175, 80, 0.08)";

/// Zone-formation candles.
pub const FORMATION: &str = "#FFD700";
pub const FORMATION_BORDER: &str = "#FFA500";

pub const ENTRY: &str = "#FFFFFF";
pub const STOP: &str = "#FF5252";
pub const TARGET: &str = "#4CAF50";
pub const HVN: &str = "#FFC107";
pub const LVN: &str = "#2196F3";

pub const CURRENT_ALERT: &str = "#FFFFFF";
pub const CURRENT_SETUP: &str = "#FFEB3B";
pub const CURRENT_PRICE_ACTION: &str = "#2196F3";

/// Stroke pattern of a horizontal price line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dotted,
    Dashed,
}

/// Fill and border of a zone rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneColors {
    pub fill: &'static str,
    pub border: &'static str,
}

pub fn zone_colors(kind: ZoneKind, broken: bool) -> ZoneColors {
    match (kind, broken) {
        (ZoneKind::Supply, false) => ZoneColors {
            fill: SUPPLY_FILL,
            border: SUPPLY_BORDER,
        },
        (ZoneKind::Supply, true) => ZoneColors {
            fill: BROKEN_SUPPLY_FILL,
            border: SUPPLY_BORDER,
        },
        (ZoneKind::Demand, false) => ZoneColors {
            fill: DEMAND_FILL,
            border: DEMAND_BORDER,
        },
        (ZoneKind::Demand, true) => ZoneColors {
            fill: BROKEN_DEMAND_FILL,
            border: DEMAND_BORDER,
        },
    }
}

/// Chart-wide colors embedded in every payload.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Palette {
    pub up: &'static str,
    pub down: &'static str,
    pub formation: &'static str,
    pub formation_border: &'static str,
    pub background: &'static str,
    pub text: &'static str,
    pub grid: &'static str,
}

pub const PALETTE: Palette = Palette {
    up: UP,
    down: DOWN,
    formation: FORMATION,
    formation_border: FORMATION_BORDER,
    background: "#131722",
    text: "#d1d4dc",
    grid: "#1e222d",
};

/// `#rrggbb` or `rgba(r, g, b, a)` -> (rgb, alpha).
pub fn parse_color(css: &str) -> Option<([u8; 3], f32)> {
    let css = css.trim();
    if let Some(hex) = css.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some(([channel(0)?, channel(2)?, channel(4)?], 1.0));
    }
    let inner = css.strip_prefix("rgba(")?.strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let [r, g, b, a] = parts.as_slice() else {
        return None;
    };
    Some(([r.parse().ok()?, g.parse().ok()?, b.parse().ok()?], a.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_zones_are_dimmed() {
        let live = zone_colors(ZoneKind::Demand, false);
        let broken = zone_colors(ZoneKind::Demand, true);
        assert_eq!(live.border, broken.border);
        assert_ne!(live.fill, broken.fill);
    }

    #[test]
    fn parses_palette_colors() {
        assert_eq!(parse_color(UP), Some(([0x26, 0xa6, 0x9a], 1.0)));
        assert_eq!(parse_color(SUPPLY_FILL), Some(([255, 82, 82], 0.2)));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("hsl(1, 2%, 3%)"), None);
    }
}
