//! Application configuration: defaults, TOML loading, and normalization.
//!
//! One [`AppConfig`] is built at process start and handed by reference to every
//! component that needs it. It carries:
//! - Market session settings used for single-day start clamping
//! - Chart limits (minimum usable candles, zone / volume-profile caps)
//! - Per instrument family: schema, table names, view naming convention and the
//!   ordered timeframe table (label -> minutes + lookback)
//! - The chart-timeframe selection table used for zone alerts
//! - Publishing settings (local directory, remote container, credential variable)
//!
//! Every field has a default, so a TOML file only needs to carry overrides:
//!
//! ```
//! use zone_store::config::load_config_str;
//!
//! let cfg = load_config_str(r#"
//!     [chart]
//!     min_candles = 20
//! "#).unwrap();
//! assert_eq!(cfg.chart.min_candles, 20);
//! assert_eq!(cfg.chart.zone_limit, 30);
//! ```
//!
//! Table, view, and schema names end up interpolated into SQL text, so
//! normalization rejects anything that is not a plain (optionally
//! schema-qualified) identifier.

use std::{collections::HashSet, mem, path::PathBuf};

use anyhow::{Context, bail};
use chrono::NaiveTime;
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use toml::from_str;

use crate::timeframe::Timeframe;

/// Instrument family. Each family lives in its own database schema and has its
/// own timeframe table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    /// Session-traded equities (390-minute trading day).
    Stocks,
    /// Continuously traded instruments.
    Crypto,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    /// Market session settings.
    pub market: MarketCfg,
    /// Chart limits and defaults.
    pub chart: ChartCfg,
    /// Per-family database layout and timeframe tables.
    pub families: FamiliesCfg,
    /// Schema-qualified label -> id lookup table for zone timeframes.
    pub timeframes_table: String,
    /// Ordered zone-timeframe -> chart-timeframe selection table.
    pub chart_timeframes: Vec<ChartTimeframeCfg>,
    /// Output settings.
    pub publish: PublishCfg,
}

/// Market session settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MarketCfg {
    /// Session open as `HH:MM` in `timezone`.
    pub open: String,
    /// IANA time zone name of the session.
    pub timezone: String,
}

/// Parsed form of [`MarketCfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    /// Session open, local wall time.
    pub open: NaiveTime,
    /// Session time zone.
    pub tz: Tz,
}

/// Chart limits and defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ChartCfg {
    /// Below this many candles a chart is not worth producing.
    pub min_candles: usize,
    /// Max zones returned per symbol/timeframe.
    pub zone_limit: usize,
    /// Max volume-profile levels returned per window.
    pub volume_profile_limit: usize,
    /// Price-action chart timeframe when the caller does not pick one.
    pub price_action_minutes: u32,
    /// Price-action lookback when the caller does not pick one.
    pub price_action_lookback_days: u32,
    /// Dashboard lookback for timeframes without their own.
    pub dashboard_lookback_days: u32,
}

/// The two family layouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct FamiliesCfg {
    pub stocks: FamilyCfg,
    pub crypto: FamilyCfg,
}

/// Database layout and timeframe table for one instrument family.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FamilyCfg {
    /// Schema holding every table below (e.g. `stocks`).
    pub schema: String,
    /// Display label (e.g. `STOCKS`).
    pub label: String,
    /// Precomputed view naming convention.
    pub views: ViewNamingCfg,
    /// Minute-level table used when no precomputed view exists.
    pub base_table: String,
    /// Ticker -> id table.
    pub symbols_table: String,
    /// Zone table.
    pub zones_table: String,
    /// Volume-profile table.
    pub volume_profile_table: String,
    /// Ordered dashboard timeframes, keyed by label.
    pub timeframes: IndexMap<String, TimeframeCfg>,
}

/// `<schema>.<prefix>_<N><unit>` view naming.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ViewNamingCfg {
    /// View name prefix (e.g. `candles`).
    pub prefix: String,
    /// Minutes in one "day" unit (390 for a US equity session, 1440 otherwise).
    pub day_minutes: u32,
    /// Whether whole-hour timeframes use the `h` unit.
    pub hour_unit: bool,
}

/// One dashboard timeframe.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeframeCfg {
    /// Bar interval in minutes.
    pub minutes: u32,
    /// Days of history; falls back to the caller's lookback when absent.
    pub lookback_days: Option<u32>,
    /// Explicit view name overriding the naming convention.
    pub view: Option<String>,
}

/// Zone timeframe -> chart timeframe rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChartTimeframeCfg {
    /// Applies to zones whose timeframe is at most this many minutes.
    pub zone_max_minutes: u32,
    /// Chart timeframe to draw them on.
    pub chart_minutes: u32,
    /// Human label of the chart timeframe.
    pub label: String,
}

/// Output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PublishCfg {
    /// Directory for local output.
    pub local_dir: PathBuf,
    /// Remote blob container.
    pub container: String,
    /// Environment variable holding the remote SAS URL.
    pub credentials_env: String,
    /// Thumbnail width in pixels.
    pub thumbnail_width: u32,
    /// Thumbnail height in pixels.
    pub thumbnail_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            market: MarketCfg::default(),
            chart: ChartCfg::default(),
            families: FamiliesCfg::default(),
            timeframes_table: "shared.timeframes".into(),
            chart_timeframes: default_chart_timeframes(),
            publish: PublishCfg::default(),
        }
    }
}

impl Default for MarketCfg {
    fn default() -> Self {
        Self {
            open: "09:30".into(),
            timezone: "America/New_York".into(),
        }
    }
}

impl Default for ChartCfg {
    fn default() -> Self {
        Self {
            min_candles: 10,
            zone_limit: 30,
            volume_profile_limit: 50,
            price_action_minutes: 5,
            price_action_lookback_days: 30,
            dashboard_lookback_days: 90,
        }
    }
}

impl Default for FamiliesCfg {
    fn default() -> Self {
        Self {
            stocks: FamilyCfg::stocks(),
            crypto: FamilyCfg::crypto(),
        }
    }
}

impl Default for PublishCfg {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("data/charts"),
            container: "trading-charts".into(),
            credentials_env: "CHART_STORE_SAS_URL".into(),
            thumbnail_width: 1920,
            thumbnail_height: 1080,
        }
    }
}

fn timeframe_table(rows: &[(&str, u32, u32)]) -> IndexMap<String, TimeframeCfg> {
    rows.iter()
        .map(|&(label, minutes, lookback)| {
            (
                label.to_string(),
                TimeframeCfg {
                    minutes,
                    lookback_days: Some(lookback),
                    view: None,
                },
            )
        })
        .collect()
}

impl FamilyCfg {
    /// Default equity layout (`stocks` schema, factors of the 390-minute session).
    pub fn stocks() -> Self {
        Self {
            schema: "stocks".into(),
            label: "STOCKS".into(),
            views: ViewNamingCfg {
                prefix: "candles".into(),
                day_minutes: 390,
                hour_unit: false,
            },
            base_table: "minute_aggregates".into(),
            symbols_table: "symbols".into(),
            zones_table: "zones".into(),
            volume_profile_table: "volume_profile".into(),
            timeframes: timeframe_table(&[
                ("2min", 2, 5),
                ("3min", 3, 7),
                ("5min", 5, 14),
                ("6min", 6, 14),
                ("10min", 10, 30),
                ("13min", 13, 30),
                ("15min", 15, 60),
                ("26min", 26, 90),
                ("30min", 30, 90),
                ("39min", 39, 180),
                ("65min", 65, 180),
                ("78min", 78, 180),
                ("130min", 130, 365),
                ("195min", 195, 365),
                ("390min", 390, 730),
                ("5day", 1950, 730),
                ("22day", 8580, 1095),
                ("65day", 25350, 1825),
            ]),
        }
    }

    /// Default crypto layout (`crypto` schema, 24/7 calendar).
    pub fn crypto() -> Self {
        Self {
            schema: "crypto".into(),
            label: "CRYPTO".into(),
            views: ViewNamingCfg {
                prefix: "candles".into(),
                day_minutes: 1440,
                hour_unit: true,
            },
            base_table: "minute_aggregates".into(),
            symbols_table: "symbols".into(),
            zones_table: "zones".into(),
            volume_profile_table: "volume_profile".into(),
            timeframes: timeframe_table(&[
                ("5min", 5, 7),
                ("15min", 15, 14),
                ("30min", 30, 30),
                ("1hour", 60, 60),
                ("2hour", 120, 90),
                ("4hour", 240, 180),
                ("8hour", 480, 365),
                ("1day", 1440, 730),
                ("7day", 10080, 1095),
                ("31day", 44640, 1825),
                ("93day", 133920, 2555),
            ]),
        }
    }

    /// `<schema>.<table>`.
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    /// Unqualified name of the precomputed view for `tf`.
    ///
    /// An entry in `timeframes` with the same minute count and an explicit
    /// `view` wins over the naming convention.
    pub fn view_name(&self, tf: Timeframe) -> String {
        self.timeframes
            .values()
            .find(|t| t.minutes == tf.minutes())
            .and_then(|t| t.view.clone())
            .unwrap_or_else(|| {
                format!(
                    "{}_{}",
                    self.views.prefix,
                    tf.view_suffix(self.views.day_minutes, self.views.hour_unit)
                )
            })
    }
}

fn default_chart_timeframes() -> Vec<ChartTimeframeCfg> {
    [
        (5, 1, "1min"),
        (15, 3, "3min"),
        (30, 5, "5min"),
        (60, 15, "15min"),
        (240, 30, "30min"),
        (390, 65, "65min"),
        (u32::MAX, 390, "390min"),
    ]
    .into_iter()
    .map(|(zone_max_minutes, chart_minutes, label)| ChartTimeframeCfg {
        zone_max_minutes,
        chart_minutes,
        label: label.into(),
    })
    .collect()
}

impl AppConfig {
    /// Layout of `family`.
    pub fn family(&self, family: InstrumentFamily) -> &FamilyCfg {
        match family {
            InstrumentFamily::Stocks => &self.families.stocks,
            InstrumentFamily::Crypto => &self.families.crypto,
        }
    }
}

impl MarketCfg {
    /// Parse `open` and `timezone`.
    pub fn hours(&self) -> anyhow::Result<MarketHours> {
        let open = NaiveTime::parse_from_str(self.open.trim(), "%H:%M")
            .with_context(|| format!("market.open must be HH:MM, got {:?}", self.open))?;
        let tz: Tz = self
            .timezone
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("bad market.timezone {:?}: {e}", self.timezone))?;
        Ok(MarketHours { open, tz })
    }
}

/// `ident` or `schema.ident`, ASCII letters/digits/underscore, not starting with a digit.
fn is_sql_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|p| {
            let mut chars = p.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn check_ident(what: &str, name: &str) -> anyhow::Result<()> {
    if !is_sql_identifier(name) {
        bail!("{what} is not a valid SQL identifier: {name:?}");
    }
    Ok(())
}

fn normalize_family(which: &str, fam: &mut FamilyCfg) -> anyhow::Result<()> {
    for (what, value) in [
        ("schema", &mut fam.schema),
        ("views.prefix", &mut fam.views.prefix),
        ("base_table", &mut fam.base_table),
        ("symbols_table", &mut fam.symbols_table),
        ("zones_table", &mut fam.zones_table),
        ("volume_profile_table", &mut fam.volume_profile_table),
    ] {
        *value = value.trim().to_string();
        check_ident(&format!("families.{which}.{what}"), value)?;
    }
    if fam.views.day_minutes == 0 {
        bail!("families.{which}.views.day_minutes must be > 0");
    }

    let mut rebuilt = IndexMap::new();
    for (raw_label, mut tf) in mem::take(&mut fam.timeframes) {
        let label = raw_label.trim().to_string();
        if label.is_empty() {
            bail!("families.{which}: timeframe label cannot be empty after trimming");
        }
        if tf.minutes == 0 {
            bail!("families.{which}.timeframes.{label}: minutes must be > 0");
        }
        if let Some(view) = tf.view.as_mut() {
            *view = view.trim().to_string();
            check_ident(&format!("families.{which}.timeframes.{label}.view"), view)?;
        }
        if rebuilt.insert(label.clone(), tf).is_some() {
            bail!("families.{which}: duplicate timeframe label after normalization: {label}");
        }
    }
    if rebuilt.is_empty() {
        bail!("families.{which}: at least one timeframe is required");
    }
    fam.timeframes = rebuilt;
    Ok(())
}

/// Normalize and validate a configuration in place.
///
/// - Trims names and labels; labels must stay unique after trimming
/// - Table/view/schema names must be plain SQL identifiers
/// - Timeframe minutes must be non-zero; each family needs at least one timeframe
/// - `market.open` / `market.timezone` must parse
/// - The chart-timeframe table must be non-empty and sorted by `zone_max_minutes`
/// - Thumbnail size must be non-zero; publish container and credential variable non-empty
pub fn normalize_config(cfg: &mut AppConfig) -> anyhow::Result<()> {
    cfg.market.hours()?;

    normalize_family("stocks", &mut cfg.families.stocks)?;
    normalize_family("crypto", &mut cfg.families.crypto)?;

    cfg.timeframes_table = cfg.timeframes_table.trim().to_string();
    check_ident("timeframes_table", &cfg.timeframes_table)?;

    if cfg.chart_timeframes.is_empty() {
        bail!("chart_timeframes cannot be empty");
    }
    let mut seen = HashSet::new();
    for rule in &mut cfg.chart_timeframes {
        rule.label = rule.label.trim().to_string();
        if rule.chart_minutes == 0 {
            bail!("chart_timeframes.{}: chart_minutes must be > 0", rule.label);
        }
        if !seen.insert(rule.zone_max_minutes) {
            bail!("chart_timeframes: duplicate zone_max_minutes {}", rule.zone_max_minutes);
        }
    }
    if !cfg
        .chart_timeframes
        .windows(2)
        .all(|w| w[0].zone_max_minutes < w[1].zone_max_minutes)
    {
        bail!("chart_timeframes must be sorted by zone_max_minutes");
    }

    if cfg.chart.zone_limit == 0 || cfg.chart.volume_profile_limit == 0 {
        bail!("chart.zone_limit and chart.volume_profile_limit must be > 0");
    }
    if cfg.chart.price_action_minutes == 0 {
        bail!("chart.price_action_minutes must be > 0");
    }
    if cfg.publish.thumbnail_width == 0 || cfg.publish.thumbnail_height == 0 {
        bail!("publish.thumbnail_width and publish.thumbnail_height must be > 0");
    }
    cfg.publish.container = cfg.publish.container.trim().to_string();
    if cfg.publish.container.is_empty() || cfg.publish.credentials_env.trim().is_empty() {
        bail!("publish.container and publish.credentials_env cannot be empty");
    }
    Ok(())
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<AppConfig> {
    let mut cfg: AppConfig = from_str(toml_str).context("failed to parse config TOML")?;
    normalize_config(&mut cfg).context("invalid configuration")?;
    Ok(cfg)
}

/// Read a configuration TOML file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
