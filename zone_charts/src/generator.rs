//! Chart generation: fetch, assemble, render, publish.
//!
//! Every operation returns `Ok(None)` for soft failures (unknown symbol, too
//! little data, a failed fetch on a single-chart path) and `Err` only when
//! rendering or publishing fails. Sessions are opened per call and dropped on
//! every exit path.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{error, info, warn};
use zone_store::{
    Connect, MarketData, StoreResult,
    config::{AppConfig, FamilyCfg},
    models::SymbolId,
    source::{CandleRequest, StartPadding},
    timeframe::Timeframe,
};

use crate::{
    chart::{self, ChartSpec, TimeframeBucket, ZoneAlert, ZoneSetup},
    error::{ChartError, RenderError},
    naming::{self, OutputKind},
    publish::Publisher,
    render::Renderer,
    selector::{TableSelector, TimeframeSelector},
};

/// Locations of one published chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartOutput {
    /// Interactive HTML document.
    pub html: String,
    /// PNG preview, when rendered.
    pub thumbnail: Option<String>,
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Symbol -> dashboard location, in processing order.
    pub published: IndexMap<String, String>,
    /// Symbols that produced nothing.
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.published.len() + self.skipped.len()
    }
}

/// The PNG preview is best-effort: a render failure is logged and skipped.
fn usable_thumbnail(symbol: &str, rendered: Result<Option<Vec<u8>>, RenderError>) -> Option<Vec<u8>> {
    match rendered {
        Ok(png) => png,
        Err(error) => {
            warn!(symbol, %error, "thumbnail render failed; publishing HTML only");
            None
        }
    }
}

/// Generates and publishes charts for one instrument family.
pub struct ChartGenerator<'a, C: Connect> {
    cfg: &'a AppConfig,
    connector: C,
    selector: Box<dyn TimeframeSelector>,
    renderer: Renderer,
    publisher: Box<dyn Publisher>,
}

impl<'a, C: Connect> ChartGenerator<'a, C> {
    pub fn new(
        cfg: &'a AppConfig,
        connector: C,
        publisher: Box<dyn Publisher>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            cfg,
            connector,
            selector: Box::new(TableSelector::from_config(cfg)?),
            renderer: Renderer::new(&cfg.publish)?,
            publisher,
        })
    }

    fn family(&self) -> &FamilyCfg {
        self.cfg.family(self.connector.family())
    }

    fn open_session(&self, symbol: &str) -> Option<C::Session> {
        match self.connector.connect() {
            Ok(session) => Some(session),
            Err(error) => {
                error!(symbol, %error, "cannot open market-data session");
                None
            }
        }
    }

    fn resolve(&self, session: &mut C::Session, symbol: &str) -> Option<SymbolId> {
        match session.resolve_symbol(symbol) {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                warn!(symbol, family = %self.family().label, "unknown symbol; no chart produced");
                None
            }
            Err(error) => {
                error!(symbol, %error, "symbol lookup failed");
                None
            }
        }
    }

    /// Open a session, resolve `symbol`, run one fetch. `None` on any failure.
    fn fetch_for_symbol<T>(
        &self,
        symbol: &str,
        what: &str,
        fetch: impl FnOnce(&mut C::Session, SymbolId) -> StoreResult<T>,
    ) -> Option<T> {
        let mut session = self.open_session(symbol)?;
        let id = self.resolve(&mut session, symbol)?;
        match fetch(&mut session, id) {
            Ok(value) => Some(value),
            Err(error) => {
                error!(symbol, what, %error, "fetch failed; no chart produced");
                None
            }
        }
    }

    fn emit(
        &self,
        spec: &ChartSpec,
        stem: &str,
        generated_at: DateTime<Utc>,
        with_thumbnail: bool,
    ) -> Result<ChartOutput, ChartError> {
        let html = self.renderer.render(spec, generated_at)?;
        let html = self.publisher.publish(html.as_bytes(), stem, OutputKind::Html)?;
        let thumbnail = if with_thumbnail {
            match usable_thumbnail(&spec.symbol, self.renderer.render_thumbnail(spec)) {
                Some(png) => Some(self.publisher.publish(&png, stem, OutputKind::Png)?),
                None => None,
            }
        } else {
            None
        };
        info!(symbol = %spec.symbol, flavor = ?spec.flavor, location = %html, "chart published");
        Ok(ChartOutput { html, thumbnail })
    }

    /// Zone drawn on the lower chart timeframe picked for its detection timeframe.
    pub fn zone_alert(&self, alert: &ZoneAlert) -> Result<Option<ChartOutput>, ChartError> {
        let chart_tf = self.selector.chart_timeframe(alert.zone_minutes);
        let Some(candles) = self.fetch_for_symbol(&alert.symbol, "candles", |session, id| {
            session.fetch_candles(&CandleRequest {
                symbol_id: id,
                timeframe: chart_tf.timeframe,
                start: alert.formed_at,
                end: alert.now,
                padding: StartPadding::Context,
            })
        }) else {
            return Ok(None);
        };
        if candles.is_empty() {
            warn!(symbol = %alert.symbol, timeframe = %chart_tf.label, "no candles; no chart produced");
            return Ok(None);
        }

        let spec = chart::zone_alert(alert, &self.family().label, &chart_tf, candles);
        let now = Utc::now();
        let stem = naming::zone_alert_stem(&alert.symbol, alert.kind, alert.zone_minutes, now);
        self.emit(&spec, &stem, now, true).map(Some)
    }

    /// Zone with entry, stop, target and volume-profile levels; candles are supplied.
    pub fn zone_with_targets(&self, setup: &ZoneSetup) -> Result<Option<ChartOutput>, ChartError> {
        if setup.candles.is_empty() {
            warn!(symbol = %setup.symbol, "no candles supplied; no chart produced");
            return Ok(None);
        }
        let spec = chart::zone_with_targets(setup, &self.family().label);
        let now = Utc::now();
        let stem = naming::zone_setup_stem(&setup.symbol, setup.kind, now);
        self.emit(&spec, &stem, now, true).map(Some)
    }

    /// Plain candles with the last close marked.
    ///
    /// `timeframe_minutes` and `lookback_days` fall back to the configured
    /// price-action defaults; `now` defaults to the current time.
    pub fn price_action(
        &self,
        symbol: &str,
        timeframe_minutes: Option<u32>,
        lookback_days: Option<u32>,
        now: Option<DateTime<Utc>>,
    ) -> Result<Option<ChartOutput>, ChartError> {
        let minutes = timeframe_minutes.unwrap_or(self.cfg.chart.price_action_minutes);
        let Some(timeframe) = Timeframe::from_minutes(minutes) else {
            warn!(symbol, "zero-minute timeframe requested; no chart produced");
            return Ok(None);
        };
        let lookback = lookback_days.unwrap_or(self.cfg.chart.price_action_lookback_days);
        let end = now.unwrap_or_else(Utc::now);
        let Some(candles) = self.fetch_for_symbol(symbol, "candles", |session, id| {
            session.fetch_candles(&CandleRequest {
                padding: StartPadding::Context,
                ..CandleRequest::lookback(id, timeframe, end, lookback)
            })
        }) else {
            return Ok(None);
        };
        if candles.len() < self.cfg.chart.min_candles {
            warn!(
                symbol,
                timeframe = %timeframe,
                count = candles.len(),
                min = self.cfg.chart.min_candles,
                "insufficient data; no chart produced"
            );
            return Ok(None);
        }

        let label = timeframe.to_string();
        let spec = chart::price_action(symbol, &self.family().label, &label, minutes, candles);
        let generated = Utc::now();
        let stem = naming::price_action_stem(symbol, &label, generated);
        self.emit(&spec, &stem, generated, true).map(Some)
    }

    fn fetch_bucket(
        session: &mut C::Session,
        label: &str,
        request: &CandleRequest,
    ) -> StoreResult<TimeframeBucket> {
        let candles = session.fetch_candles(request)?;
        let zones = session.fetch_zones(request.symbol_id, label)?;
        let volume_profile =
            session.fetch_volume_profile(request.symbol_id, request.start, request.end)?;
        Ok(TimeframeBucket::populated(
            request.timeframe.minutes(),
            candles,
            &zones,
            volume_profile,
        ))
    }

    /// One bucket per configured timeframe of the family.
    ///
    /// A timeframe whose fetch fails becomes an empty placeholder and the session
    /// is replaced before the next timeframe. `lookback_days` applies to
    /// timeframes without their own lookback.
    pub fn dashboard(&self, symbol: &str, lookback_days: u32) -> Result<Option<ChartOutput>, ChartError> {
        let Some(mut first) = self.open_session(symbol) else {
            return Ok(None);
        };
        let Some(symbol_id) = self.resolve(&mut first, symbol) else {
            return Ok(None);
        };

        let family = self.family();
        let end = Utc::now();
        let mut session = Some(first);
        let mut buckets = IndexMap::with_capacity(family.timeframes.len());
        let mut failed = 0usize;

        for (label, tf_cfg) in &family.timeframes {
            let Some(timeframe) = Timeframe::from_minutes(tf_cfg.minutes) else {
                continue;
            };
            let lookback = tf_cfg.lookback_days.unwrap_or(lookback_days);
            let request = CandleRequest::lookback(symbol_id, timeframe, end, lookback);

            let fetched = match session.as_mut() {
                Some(open) => Self::fetch_bucket(open, label, &request),
                None => self
                    .connector
                    .connect()
                    .and_then(|fresh| Self::fetch_bucket(session.insert(fresh), label, &request)),
            };
            match fetched {
                Ok(bucket) => {
                    info!(
                        symbol,
                        timeframe = %label,
                        candles = bucket.candles.len(),
                        zones = bucket.zones.len(),
                        levels = bucket.volume_profile.len(),
                        "timeframe ready"
                    );
                    buckets.insert(label.clone(), bucket);
                }
                Err(error) => {
                    error!(symbol, timeframe = %label, %error, "timeframe fetch failed; using placeholder");
                    buckets.insert(label.clone(), TimeframeBucket::placeholder(timeframe.minutes()));
                    failed += 1;
                    // The next timeframe gets a fresh session.
                    session = None;
                }
            }
        }
        drop(session);

        if buckets.values().all(|b| b.candles.is_empty()) {
            warn!(symbol, failed, "no candles on any timeframe; no dashboard produced");
            return Ok(None);
        }
        if failed > 0 {
            warn!(symbol, failed, total = buckets.len(), "dashboard has placeholder timeframes");
        }

        let spec = chart::dashboard(symbol, &family.label, buckets);
        let generated = Utc::now();
        let stem = naming::dashboard_stem(&family.schema, symbol, generated);
        self.emit(&spec, &stem, generated, false).map(Some)
    }

    /// Dashboards for every symbol of the family, one after another.
    ///
    /// A symbol that fails is logged and skipped. Only the symbol listing itself
    /// can fail the batch.
    pub fn dashboards_for_all(&self, lookback_days: u32) -> StoreResult<BatchReport> {
        let symbols = {
            let mut session = self.connector.connect()?;
            session.list_symbols()?
        };
        info!(count = symbols.len(), family = %self.family().label, "batch started");

        let mut report = BatchReport::default();
        for symbol in symbols {
            match self.dashboard(&symbol, lookback_days) {
                Ok(Some(output)) => {
                    report.published.insert(symbol, output.html);
                }
                Ok(None) => report.skipped.push(symbol),
                Err(error) => {
                    error!(symbol = %symbol, %error, "dashboard failed");
                    report.skipped.push(symbol);
                }
            }
        }
        info!(
            published = report.published.len(),
            total = report.total(),
            "batch complete: {}/{}",
            report.published.len(),
            report.total()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RasterSnafu;

    #[test]
    fn thumbnail_render_failure_is_dropped() {
        let failed = Err(RasterSnafu { message: "encoder failed" }.build());
        assert_eq!(usable_thumbnail("AAPL", failed), None);
    }

    #[test]
    fn rendered_thumbnail_is_kept() {
        assert_eq!(usable_thumbnail("AAPL", Ok(Some(vec![1, 2, 3]))), Some(vec![1, 2, 3]));
        assert_eq!(usable_thumbnail("AAPL", Ok(None)), None);
    }
}
