#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Candle, CandleSeries, Level1Field, MarketDepth, OrderSide, Quote};
use parking_lot::Mutex;
use surface::{CandleSource, CandleSourceEvents, Connector, ConnectorEvents, MarketDepthEvents, MarketDepthSource};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

// ─── Connector ───────────────────────────────────────────────────────────────

pub struct Venue {
    pub events: ConnectorEvents,
    now: Mutex<DateTime<Utc>>,
    values: Mutex<HashMap<(String, Level1Field), f64>>,
}

impl Venue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: ConnectorEvents::default(),
            now: Mutex::new(t0()),
            values: Mutex::new(HashMap::new()),
        })
    }

    pub fn set_value(&self, security_id: &str, field: Level1Field, value: f64) {
        self.values.lock().insert((security_id.to_string(), field), value);
    }

    /// Move market time forward and announce it.
    pub fn advance(&self, step: Duration) {
        *self.now.lock() += step;
        self.events.market_time_changed.raise(step);
    }
}

impl Connector for Venue {
    fn connector_events(&self) -> &ConnectorEvents {
        &self.events
    }

    fn current_time(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn security_value(&self, security_id: &str, field: Level1Field) -> Option<f64> {
        self.values.lock().get(&(security_id.to_string(), field)).copied()
    }
}

// ─── Order book ──────────────────────────────────────────────────────────────

pub struct Book {
    pub events: MarketDepthEvents,
    depth: Mutex<MarketDepth>,
}

impl Book {
    pub fn new(security_id: &str) -> Arc<Self> {
        Arc::new(Self {
            events: MarketDepthEvents::default(),
            depth: Mutex::new(MarketDepth::empty(security_id)),
        })
    }

    /// Replace the top of book and raise `quotes_changed`.
    pub fn quote(&self, bid: Option<f64>, ask: Option<f64>) {
        {
            let mut depth = self.depth.lock();
            let security_id = depth.security_id.clone();
            let level = |side, price| Quote {
                security_id: security_id.clone(),
                side,
                price,
                volume: 1.0,
            };
            depth.bids = bid.map(|p| level(OrderSide::Buy, p)).into_iter().collect();
            depth.asks = ask.map(|p| level(OrderSide::Sell, p)).into_iter().collect();
        }
        self.events.quotes_changed.raise();
    }
}

impl MarketDepthSource for Book {
    fn depth_events(&self) -> &MarketDepthEvents {
        &self.events
    }

    fn depth(&self) -> MarketDepth {
        self.depth.lock().clone()
    }
}

// ─── Candle source ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Builder {
    pub events: CandleSourceEvents,
    current: Mutex<Option<Candle>>,
}

impl Builder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish an update and remember it as the current candle.
    pub fn push(&self, series: &CandleSeries, candle: Candle) {
        *self.current.lock() = Some(candle.clone());
        self.events.processing.raise(series.clone(), candle);
    }

    pub fn set_current(&self, candle: Option<Candle>) {
        *self.current.lock() = candle;
    }
}

impl CandleSource for Builder {
    fn candle_events(&self) -> &CandleSourceEvents {
        &self.events
    }

    fn current_candle(&self, series: &CandleSeries) -> Option<Candle> {
        self.current
            .lock()
            .clone()
            .filter(|c| c.security_id == series.security_id)
    }
}
