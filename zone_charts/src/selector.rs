//! Zone timeframe -> chart timeframe selection.

use anyhow::{anyhow, bail};
use zone_store::{config::AppConfig, timeframe::Timeframe};

/// Lower timeframe a zone is drawn on, with its display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartTimeframe {
    pub timeframe: Timeframe,
    pub label: String,
}

/// Picks the chart timeframe for a zone detected on `zone_minutes` bars.
pub trait TimeframeSelector {
    fn chart_timeframe(&self, zone_minutes: u32) -> ChartTimeframe;
}

/// Selector driven by the `chart_timeframes` configuration table.
///
/// The first rule whose `zone_max_minutes` covers the zone wins; zones beyond the
/// table use the last rule.
#[derive(Debug, Clone)]
pub struct TableSelector {
    rules: Vec<(u32, ChartTimeframe)>,
    fallback: ChartTimeframe,
}

impl TableSelector {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let mut rules = Vec::with_capacity(cfg.chart_timeframes.len());
        for rule in &cfg.chart_timeframes {
            let timeframe = Timeframe::from_minutes(rule.chart_minutes)
                .ok_or_else(|| anyhow!("chart timeframe {} has zero minutes", rule.label))?;
            rules.push((
                rule.zone_max_minutes,
                ChartTimeframe {
                    timeframe,
                    label: rule.label.clone(),
                },
            ));
        }
        let Some((_, fallback)) = rules.last().cloned() else {
            bail!("chart_timeframes is empty");
        };
        Ok(Self { rules, fallback })
    }
}

impl TimeframeSelector for TableSelector {
    fn chart_timeframe(&self, zone_minutes: u32) -> ChartTimeframe {
        self.rules
            .iter()
            .find(|(max, _)| zone_minutes <= *max)
            .map(|(_, tf)| tf.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}
