use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

// ─── Instruments ─────────────────────────────────────────────────────────────

/// Trading venue board a security is listed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeBoard {
    pub code: String,
    pub exchange: String,
}

impl std::fmt::Display for ExchangeBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.code, self.exchange)
    }
}

/// Trading session state of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Assigned,
    Active,
    Paused,
    ForceStopped,
    Ended,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Assigned => write!(f, "assigned"),
            SessionState::Active => write!(f, "active"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::ForceStopped => write!(f, "force-stopped"),
            SessionState::Ended => write!(f, "ended"),
        }
    }
}

/// A tradable instrument. A security with `legs` is a basket; it stands for
/// every security listed in its legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub id: String,
    pub code: String,
    pub board: String,
    #[serde(default = "default_price_step")]
    pub price_step: f64,
    #[serde(default)]
    pub legs: Vec<String>,
}

fn default_price_step() -> f64 {
    0.01
}

impl Security {
    pub fn new(code: impl Into<String>, board: impl Into<String>) -> Self {
        let code = code.into();
        let board = board.into();
        Self {
            id: format!("{code}@{board}"),
            code,
            board,
            price_step: default_price_step(),
            legs: Vec::new(),
        }
    }

    pub fn basket(id: impl Into<String>, legs: Vec<String>) -> Self {
        let id = id.into();
        Self {
            code: id.clone(),
            board: "BASKET".to_string(),
            id,
            price_step: default_price_step(),
            legs,
        }
    }

    pub fn is_basket(&self) -> bool {
        !self.legs.is_empty()
    }

    /// True when `security_id` is this security or, for a basket, one of
    /// its legs.
    pub fn contains(&self, security_id: &str) -> bool {
        if self.is_basket() {
            self.legs.iter().any(|leg| leg == security_id)
        } else {
            self.id == security_id
        }
    }
}

impl std::fmt::Display for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

// ─── Orders and trades ───────────────────────────────────────────────────────

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn invert(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
    /// Stop order; routed through the stop-order events.
    Conditional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    #[default]
    None,
    Pending,
    Active,
    Done,
    Failed,
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderState::None => write!(f, "none"),
            OrderState::Pending => write!(f, "pending"),
            OrderState::Active => write!(f, "active"),
            OrderState::Done => write!(f, "done"),
            OrderState::Failed => write!(f, "failed"),
        }
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique transaction id for new orders and requests.
pub fn next_transaction_id() -> u64 {
    NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// An order, identified by its transaction id. Notifications carry
/// snapshots; compare orders with [`Order::same_as`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub transaction_id: u64,
    pub security_id: String,
    pub portfolio: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Limit price; 0 for market orders.
    pub price: f64,
    pub volume: f64,
    /// Unfilled volume.
    pub balance: f64,
    pub state: OrderState,
    /// Trigger price of a conditional order.
    pub stop_price: Option<f64>,
    pub time: DateTime<Utc>,
}

impl Order {
    fn new(
        security_id: impl Into<String>,
        portfolio: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        price: f64,
        volume: f64,
    ) -> Self {
        Self {
            transaction_id: next_transaction_id(),
            security_id: security_id.into(),
            portfolio: portfolio.into(),
            side,
            order_type,
            price,
            volume,
            balance: volume,
            state: OrderState::None,
            stop_price: None,
            time: Utc::now(),
        }
    }

    pub fn market(
        security_id: impl Into<String>,
        portfolio: impl Into<String>,
        side: OrderSide,
        volume: f64,
    ) -> Self {
        Self::new(security_id, portfolio, side, OrderType::Market, 0.0, volume)
    }

    pub fn limit(
        security_id: impl Into<String>,
        portfolio: impl Into<String>,
        side: OrderSide,
        price: f64,
        volume: f64,
    ) -> Self {
        Self::new(security_id, portfolio, side, OrderType::Limit, price, volume)
    }

    pub fn conditional(
        security_id: impl Into<String>,
        portfolio: impl Into<String>,
        side: OrderSide,
        stop_price: f64,
        volume: f64,
    ) -> Self {
        let mut order = Self::new(
            security_id,
            portfolio,
            side,
            OrderType::Conditional,
            0.0,
            volume,
        );
        order.stop_price = Some(stop_price);
        order
    }

    pub fn same_as(&self, other: &Order) -> bool {
        self.transaction_id == other.transaction_id
    }

    pub fn is_conditional(&self) -> bool {
        self.order_type == OrderType::Conditional
    }

    /// Finished with nothing left to fill.
    pub fn is_matched(&self) -> bool {
        self.state == OrderState::Done && self.balance <= 0.0
    }

    /// Finished before being fully filled.
    pub fn is_canceled(&self) -> bool {
        self.state == OrderState::Done && self.balance > 0.0
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} {} {} @ {} [{}]",
            self.transaction_id, self.side, self.volume, self.security_id, self.price, self.state
        )
    }
}

/// An error value reported by the platform inside an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformError {
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PlatformError {}

/// A failed register or cancel request for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFail {
    pub order: Order,
    pub error: PlatformError,
    pub time: DateTime<Utc>,
}

/// A market trade (tick).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub security_id: String,
    pub price: f64,
    pub volume: f64,
    pub side: Option<OrderSide>,
    pub time: DateTime<Utc>,
}

impl Trade {
    pub fn new(security_id: impl Into<String>, price: f64, volume: f64, time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            security_id: security_id.into(),
            price,
            volume,
            side: None,
            time,
        }
    }
}

/// A fill of one of our own orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyTrade {
    /// Order snapshot taken right after this fill was applied.
    pub order: Order,
    pub trade: Trade,
    pub commission: Option<f64>,
}

/// One entry of the full order log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLogItem {
    pub order: Order,
    pub trade: Option<Trade>,
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub name: String,
    pub begin_value: f64,
    pub current_value: f64,
    #[serde(default)]
    pub board: Option<String>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            begin_value: value,
            current_value: value,
            board: None,
        }
    }
}

/// Holding of one security in one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub portfolio: String,
    pub security_id: String,
    pub begin_value: f64,
    pub current_value: f64,
}

impl Position {
    pub fn same_as(&self, other: &Position) -> bool {
        self.portfolio == other.portfolio && self.security_id == other.security_id
    }
}

// ─── Market data ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub security_id: String,
    pub side: OrderSide,
    pub price: f64,
    pub volume: f64,
}

/// Order book snapshot. Bids sorted best (highest) first, asks best
/// (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDepth {
    pub security_id: String,
    pub bids: Vec<Quote>,
    pub asks: Vec<Quote>,
    pub time: DateTime<Utc>,
}

impl MarketDepth {
    pub fn empty(security_id: impl Into<String>) -> Self {
        Self {
            security_id: security_id.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            time: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&Quote> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Quote> {
        self.asks.first()
    }

    /// Ask minus bid, when both sides are present.
    pub fn spread(&self) -> Option<f64> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }
}

/// Level1 fields reported through `values_changed` and
/// `Connector::security_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level1Field {
    LastTradePrice,
    LastTradeVolume,
    BestBidPrice,
    BestAskPrice,
    OpenPrice,
    HighPrice,
    LowPrice,
    ClosePrice,
    Volume,
    OpenInterest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketDataType {
    Level1,
    MarketDepth,
    Trades,
    OrderLog,
    News,
    Candles,
}

/// A market-data subscribe or unsubscribe request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataMessage {
    pub transaction_id: u64,
    pub data_type: MarketDataType,
    pub is_subscribe: bool,
}

impl MarketDataMessage {
    pub fn subscribe(data_type: MarketDataType) -> Self {
        Self {
            transaction_id: next_transaction_id(),
            data_type,
            is_subscribe: true,
        }
    }

    pub fn unsubscribe(data_type: MarketDataType) -> Self {
        Self {
            is_subscribe: false,
            ..Self::subscribe(data_type)
        }
    }
}

/// The transport adapter behind a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAdapter {
    pub name: String,
}

/// A raw message passed through the connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub adapter: String,
    pub kind: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct News {
    pub id: String,
    pub headline: String,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub security_id: Option<String>,
    pub time: DateTime<Utc>,
}

impl News {
    pub fn new(headline: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            headline: headline.into(),
            story: None,
            security_id: None,
            time,
        }
    }
}

// ─── Candles ─────────────────────────────────────────────────────────────────

/// Time-frame candles for one security.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandleSeries {
    pub security_id: String,
    pub timeframe_secs: i64,
}

impl CandleSeries {
    pub fn new(security_id: impl Into<String>, timeframe_secs: i64) -> Self {
        Self {
            security_id: security_id.into(),
            timeframe_secs,
        }
    }

    pub fn timeframe(&self) -> Duration {
        Duration::seconds(self.timeframe_secs)
    }

    /// Open time of the candle that contains `time`.
    pub fn open_time_for(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        time.duration_trunc(self.timeframe()).unwrap_or(time)
    }
}

impl std::fmt::Display for CandleSeries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}s", self.security_id, self.timeframe_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleState {
    Started,
    Changed,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub security_id: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub total_volume: f64,
    pub state: CandleState,
}

impl Candle {
    /// A fresh candle opened by its first trade.
    pub fn open(series: &CandleSeries, price: f64, volume: f64, time: DateTime<Utc>) -> Self {
        let open_time = series.open_time_for(time);
        Self {
            security_id: series.security_id.clone(),
            open_time,
            close_time: open_time + series.timeframe(),
            open_price: price,
            high_price: price,
            low_price: price,
            close_price: price,
            total_volume: volume,
            state: CandleState::Started,
        }
    }

    /// Candles are identified by security and open time.
    pub fn same_as(&self, other: &Candle) -> bool {
        self.security_id == other.security_id && self.open_time == other.open_time
    }

    pub fn is_bullish(&self) -> bool {
        self.open_price <= self.close_price
    }

    pub fn is_bearish(&self) -> bool {
        self.open_price >= self.close_price
    }
}

// ─── Strategy / logging ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    #[default]
    Stopped,
    Started,
    Stopping,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Started => write!(f, "started"),
            ProcessState::Stopping => write!(f, "stopping"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub source: String,
    pub level: LogLevel,
    pub message: String,
    pub time: DateTime<Utc>,
}
