//! Fixed-shape records for events that carry more than one value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    Candle, CandleSeries, ExchangeBoard, Level1Field, MarketDataMessage, Order, PlatformError,
    Portfolio, Security, SessionState,
};

/// A candle update together with the series it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesCandle {
    pub series: CandleSeries,
    pub candle: Candle,
}

/// Outcome of a portfolio lookup. `error` is set when the lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLookup {
    pub error: Option<PlatformError>,
    pub portfolios: Vec<Portfolio>,
}

/// Outcome of a security lookup. `error` is set when the lookup failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityLookup {
    pub error: Option<PlatformError>,
    pub securities: Vec<Security>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataSuccess {
    pub security: Security,
    pub message: MarketDataMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataFailure {
    pub security: Security,
    pub message: MarketDataMessage,
    pub error: PlatformError,
}

/// A request identified only by its transaction id failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFailure {
    pub transaction_id: u64,
    pub error: PlatformError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChange {
    pub board: ExchangeBoard,
    pub state: SessionState,
}

/// Level1 changes for one security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesChanged {
    pub security: Security,
    pub changes: Vec<(Level1Field, f64)>,
    pub server_time: DateTime<Utc>,
    pub local_time: DateTime<Utc>,
}

impl ValuesChanged {
    pub fn value(&self, field: Level1Field) -> Option<f64> {
        self.changes
            .iter()
            .rev()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| *v)
    }
}

/// An order being replaced by a new one (re-registration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReplacement {
    pub old: Order,
    pub new: Order,
}
