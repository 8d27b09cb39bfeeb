#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use zone_store::{
    Connect, MarketData, StoreError, StoreResult,
    config::{AppConfig, InstrumentFamily, normalize_config},
    models::{Candle, SymbolId, VolumeProfileNode, Zone, ZoneKind},
    source::CandleRequest,
};

/// Shared state behind every fake session of one connector.
#[derive(Debug, Default)]
pub struct FakeState {
    pub symbols: IndexMap<String, SymbolId>,
    pub candles: HashMap<SymbolId, Vec<Candle>>,
    /// Zones per zone-timeframe label.
    pub zones: HashMap<String, Vec<Zone>>,
    pub volume_profile: Vec<VolumeProfileNode>,
    /// Candle fetches on these bar sizes fail.
    pub failing_minutes: HashSet<u32>,
    pub refuse_connect: bool,
    pub connects: usize,
    pub open_sessions: isize,
    pub requests: Vec<CandleRequest>,
}

#[derive(Clone)]
pub struct FakeConnector {
    pub family: InstrumentFamily,
    pub state: Rc<RefCell<FakeState>>,
}

pub struct FakeSession {
    family: InstrumentFamily,
    state: Rc<RefCell<FakeState>>,
}

impl FakeConnector {
    pub fn new(state: FakeState) -> Self {
        Self {
            family: InstrumentFamily::Stocks,
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn connects(&self) -> usize {
        self.state.borrow().connects
    }

    pub fn open_sessions(&self) -> isize {
        self.state.borrow().open_sessions
    }

    pub fn requests(&self) -> Vec<CandleRequest> {
        self.state.borrow().requests.clone()
    }
}

impl Connect for FakeConnector {
    type Session = FakeSession;

    fn family(&self) -> InstrumentFamily {
        self.family
    }

    fn connect(&self) -> StoreResult<FakeSession> {
        let mut state = self.state.borrow_mut();
        state.connects += 1;
        if state.refuse_connect {
            return Err(StoreError::Connect(diesel::ConnectionError::BadConnection(
                "refused".into(),
            )));
        }
        state.open_sessions += 1;
        Ok(FakeSession {
            family: self.family,
            state: Rc::clone(&self.state),
        })
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.state.borrow_mut().open_sessions -= 1;
    }
}

impl MarketData for FakeSession {
    fn family(&self) -> InstrumentFamily {
        self.family
    }

    fn resolve_symbol(&mut self, ticker: &str) -> StoreResult<Option<SymbolId>> {
        Ok(self.state.borrow().symbols.get(ticker).copied())
    }

    fn list_symbols(&mut self) -> StoreResult<Vec<String>> {
        Ok(self.state.borrow().symbols.keys().cloned().collect())
    }

    fn fetch_candles(&mut self, request: &CandleRequest) -> StoreResult<Vec<Candle>> {
        let mut state = self.state.borrow_mut();
        state.requests.push(*request);
        if state.failing_minutes.contains(&request.timeframe.minutes()) {
            return Err(StoreError::query(format!("fake_{}", request.timeframe))(
                diesel::result::Error::NotFound,
            ));
        }
        Ok(state.candles.get(&request.symbol_id).cloned().unwrap_or_default())
    }

    fn fetch_zones(&mut self, _symbol_id: SymbolId, timeframe_label: &str) -> StoreResult<Vec<Zone>> {
        Ok(self
            .state
            .borrow()
            .zones
            .get(timeframe_label)
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_volume_profile(
        &mut self,
        _symbol_id: SymbolId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> StoreResult<Vec<VolumeProfileNode>> {
        Ok(self.state.borrow().volume_profile.clone())
    }
}

pub fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    normalize_config(&mut cfg).unwrap();
    cfg
}

/// `n` rising five-minute bars ending one hour ago.
pub fn candles(n: usize) -> Vec<Candle> {
    let first = Utc::now() - Duration::hours(1) - Duration::minutes(5 * n as i64);
    (0..n)
        .map(|i| {
            let base = 100.0 + i as f64;
            Candle {
                timestamp: first + Duration::minutes(5 * i as i64),
                open: base,
                high: base + 1.5,
                low: base - 0.5,
                close: base + 1.0,
                volume: 1_000.0 + i as f64,
            }
        })
        .collect()
}

pub fn zone(id: i64, kind: ZoneKind, top: f64, bottom: f64, is_broken: bool) -> Zone {
    Zone {
        id,
        kind,
        top,
        bottom,
        start_time: Utc::now() - Duration::days(3),
        end_time: None,
        score: 1.0 + id as f64,
        is_broken,
    }
}

/// AAPL and MSFT with 40 candles each; NOBARS is known but has no candles.
pub fn market() -> FakeState {
    let mut state = FakeState::default();
    state.symbols.insert("AAPL".into(), 1);
    state.symbols.insert("MSFT".into(), 2);
    state.symbols.insert("NOBARS".into(), 3);
    state.candles.insert(1, candles(40));
    state.candles.insert(2, candles(40));
    state.zones.insert(
        "30min".into(),
        vec![
            zone(10, ZoneKind::Demand, 101.0, 99.0, false),
            zone(11, ZoneKind::Supply, 140.0, 138.0, true),
        ],
    );
    state.volume_profile = vec![
        VolumeProfileNode {
            price: 110.0,
            volume: 5_000.0,
            is_hvn: true,
            is_lvn: false,
        },
        VolumeProfileNode {
            price: 125.0,
            volume: 200.0,
            is_hvn: false,
            is_lvn: true,
        },
    ];
    state
}

pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
