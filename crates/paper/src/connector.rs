use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use common::{
    next_transaction_id, Candle, CandleSeries, Error, ExchangeBoard, Level1Field, LogLevel,
    LogMessage, MarketDataMessage, MarketDataType, MarketDepth, Message, MessageAdapter, MyTrade,
    News, Order, OrderFail, OrderSide, OrderState, OrderType, PlatformError, Portfolio, Quote,
    Result, Security, SessionState, Trade,
};
use surface::{
    Connector, ConnectorEvents, LogSource, LogSourceEvents, MarketDataProvider,
    MarketDataProviderEvents, PortfolioProvider, SecurityProvider,
};

use crate::depth::PaperMarketDepth;
use crate::portfolios::{AccountChange, PortfolioBook};
use crate::securities::SecurityStore;

const ADAPTER: &str = "paper";

/// Simulated venue. Trades and books are pushed in by the caller; orders fill
/// against the last trade price with a fixed slippage.
pub struct PaperConnector {
    events: ConnectorEvents,
    market_data: MarketDataProviderEvents,
    logs: LogSourceEvents,
    securities: Arc<SecurityStore>,
    portfolios: Arc<PortfolioBook>,
    slippage_bps: f64,
    state: Mutex<VenueState>,
}

struct VenueState {
    connected: bool,
    now: DateTime<Utc>,
    level1: HashMap<(String, Level1Field), f64>,
    /// Latest snapshot of every order seen, keyed by transaction id.
    orders: HashMap<u64, Order>,
    depths: HashMap<String, Arc<PaperMarketDepth>>,
}

impl PaperConnector {
    pub fn new(slippage_bps: f64, start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            events: ConnectorEvents::default(),
            market_data: MarketDataProviderEvents::default(),
            logs: LogSourceEvents::default(),
            securities: SecurityStore::new(),
            portfolios: PortfolioBook::new(),
            slippage_bps,
            state: Mutex::new(VenueState {
                connected: false,
                now: start,
                level1: HashMap::new(),
                orders: HashMap::new(),
                depths: HashMap::new(),
            }),
        })
    }

    pub fn securities(&self) -> &Arc<SecurityStore> {
        &self.securities
    }

    pub fn portfolios(&self) -> &Arc<PortfolioBook> {
        &self.portfolios
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    // ─── Connection ──────────────────────────────────────────────────────

    pub fn connect(&self) {
        {
            let mut state = self.state.lock();
            if state.connected {
                return;
            }
            state.connected = true;
        }
        info!(adapter = ADAPTER, "connected");
        self.message("connect");
        self.events.connected.raise();
        self.events.connected_ex.raise(adapter());

        let securities = self.securities.all();
        if !securities.is_empty() {
            for security in &securities {
                self.events.new_security.raise(security.clone());
            }
            self.events.new_securities.raise(securities);
        }
        let portfolios = self.portfolios.portfolios();
        if !portfolios.is_empty() {
            self.events.new_portfolios.raise(portfolios);
        }
        self.log(LogLevel::Info, "connected");
    }

    pub fn disconnect(&self) {
        {
            let mut state = self.state.lock();
            if !state.connected {
                return;
            }
            state.connected = false;
        }
        info!(adapter = ADAPTER, "disconnected");
        self.message("disconnect");
        self.events.disconnected_ex.raise(adapter());
        self.events.disconnected.raise();
        self.log(LogLevel::Info, "disconnected");
    }

    /// Drop the connection with an error, as a broken transport would.
    pub fn fail_connection(&self, message: &str) {
        self.state.lock().connected = false;
        warn!(adapter = ADAPTER, reason = message, "connection lost");
        self.events.connection_error.raise(PlatformError::new(message));
        self.log(LogLevel::Error, message);
    }

    pub fn restore(&self) {
        self.state.lock().connected = true;
        info!(adapter = ADAPTER, "connection restored");
        self.events.restored.raise();
    }

    pub fn time_out(&self) {
        warn!(adapter = ADAPTER, "request timed out");
        self.events.timeout.raise();
    }

    pub fn report_error(&self, message: &str) {
        warn!(adapter = ADAPTER, error = message, "platform error");
        self.events.error.raise(PlatformError::new(message));
        self.log(LogLevel::Error, message);
    }

    pub fn set_session(&self, board: ExchangeBoard, state: SessionState) {
        debug!(board = %board, state = %state, "session state");
        self.events.session_state_changed.raise(board, state);
    }

    /// Move the market clock forward. Non-positive steps are ignored.
    pub fn advance_time(&self, step: Duration) {
        if step <= Duration::zero() {
            return;
        }
        self.state.lock().now += step;
        self.events.market_time_changed.raise(step);
    }

    // ─── Reference data ──────────────────────────────────────────────────

    pub fn add_security(&self, security: Security) {
        self.securities.add(vec![security.clone()]);
        if self.is_connected() {
            self.events.new_security.raise(security.clone());
            self.events.new_securities.raise(vec![security]);
        }
    }

    pub fn add_portfolio(&self, portfolio: Portfolio) {
        self.portfolios.add(portfolio.clone());
        if self.is_connected() {
            self.events.new_portfolios.raise(vec![portfolio]);
        }
    }

    /// Answer a security lookup. Fails while disconnected.
    pub fn lookup_securities(&self, code: &str) {
        let (error, found) = if self.is_connected() {
            (None, self.securities.find(code))
        } else {
            (Some(PlatformError::new("not connected")), Vec::new())
        };
        self.events.lookup_securities_result.raise(error, found);
    }

    pub fn lookup_portfolios(&self) {
        let (error, found) = if self.is_connected() {
            (None, self.portfolios.portfolios())
        } else {
            (Some(PlatformError::new("not connected")), Vec::new())
        };
        self.events.lookup_portfolios_result.raise(error, found);
    }

    pub fn subscribe_market_data(
        &self,
        security_id: &str,
        data_type: MarketDataType,
    ) -> Result<MarketDataMessage> {
        let security = self.known_security(security_id)?;
        let message = MarketDataMessage::subscribe(data_type);
        self.message("market_data");
        if self.is_connected() {
            self.events
                .market_data_subscription_succeeded
                .raise(security, message.clone());
        } else {
            self.events.market_data_subscription_failed.raise(
                security,
                message.clone(),
                PlatformError::new("not connected"),
            );
        }
        Ok(message)
    }

    pub fn unsubscribe_market_data(
        &self,
        security_id: &str,
        data_type: MarketDataType,
    ) -> Result<MarketDataMessage> {
        let security = self.known_security(security_id)?;
        let message = MarketDataMessage::unsubscribe(data_type);
        self.message("market_data");
        if self.is_connected() {
            self.events
                .market_data_unsubscription_succeeded
                .raise(security, message.clone());
        } else {
            self.events.market_data_unsubscription_failed.raise(
                security,
                message.clone(),
                PlatformError::new("not connected"),
            );
        }
        Ok(message)
    }

    // ─── Market data ─────────────────────────────────────────────────────

    /// Print a trade on the tape. Resting limit and stop orders on the same
    /// security are checked against its price.
    pub fn push_trade(&self, security_id: &str, price: f64, volume: f64) -> Result<Trade> {
        let security = self.known_security(security_id)?;
        let trade = Trade::new(security_id, price, volume, self.current_time());
        debug!(security = security_id, price, volume, "tape");

        self.events.new_trade.raise(trade.clone());
        self.events.new_trades.raise(vec![trade.clone()]);
        self.set_level1(
            &security,
            vec![
                (Level1Field::LastTradePrice, price),
                (Level1Field::LastTradeVolume, volume),
            ],
        );
        self.match_resting(&trade);
        Ok(trade)
    }

    /// Replace the order book of a security. Levels are `(price, volume)`.
    pub fn update_depth(
        &self,
        security_id: &str,
        bids: &[(f64, f64)],
        asks: &[(f64, f64)],
    ) -> Result<MarketDepth> {
        let security = self.known_security(security_id)?;
        let quotes = |side: OrderSide, levels: &[(f64, f64)]| -> Vec<Quote> {
            levels
                .iter()
                .map(|&(price, volume)| Quote {
                    security_id: security_id.to_string(),
                    side,
                    price,
                    volume,
                })
                .collect()
        };

        let (book, created) = {
            let mut state = self.state.lock();
            let created = !state.depths.contains_key(security_id);
            let book = state
                .depths
                .entry(security_id.to_string())
                .or_insert_with(|| Arc::new(PaperMarketDepth::new(security_id)))
                .clone();
            (book, created)
        };
        let depth = book.update(
            quotes(OrderSide::Buy, bids),
            quotes(OrderSide::Sell, asks),
            self.current_time(),
        );

        if created {
            self.events.new_market_depth.raise(depth.clone());
            self.events.new_market_depths.raise(vec![depth.clone()]);
        } else {
            self.events.market_depth_changed.raise(depth.clone());
            self.events.market_depths_changed.raise(vec![depth.clone()]);
        }

        let mut changes = Vec::new();
        if let Some(bid) = depth.best_bid() {
            changes.push((Level1Field::BestBidPrice, bid.price));
        }
        if let Some(ask) = depth.best_ask() {
            changes.push((Level1Field::BestAskPrice, ask.price));
        }
        if !changes.is_empty() {
            self.set_level1(&security, changes);
        }
        Ok(depth)
    }

    /// The live book of a security, once it has been quoted.
    pub fn market_depth(&self, security_id: &str) -> Option<Arc<PaperMarketDepth>> {
        self.state.lock().depths.get(security_id).cloned()
    }

    pub fn publish_news(&self, news: News) {
        debug!(headline = %news.headline, "news");
        self.events.new_news.raise(news);
    }

    pub(crate) fn publish_candle(&self, series: &CandleSeries, candle: &Candle) {
        self.events
            .candle_series_processing
            .raise(series.clone(), candle.clone());
    }

    pub(crate) fn publish_series_stopped(&self, series: &CandleSeries) {
        self.events.candle_series_stopped.raise(series.clone());
    }

    // ─── Orders ──────────────────────────────────────────────────────────

    /// Place an order. Unknown securities and portfolios are caller errors;
    /// everything the venue itself refuses comes back through the
    /// register-failed events and a `Failed` snapshot.
    pub fn register_order(&self, mut order: Order) -> Result<Order> {
        self.known_security(&order.security_id)?;
        if self.portfolios.lookup_portfolio(&order.portfolio).is_none() {
            return Err(Error::UnknownPortfolio(order.portfolio));
        }
        self.message("order_register");
        order.time = self.current_time();

        let last = self.security_value(&order.security_id, Level1Field::LastTradePrice);
        let refusal = if !self.is_connected() {
            Some("not connected")
        } else if order.volume <= 0.0 {
            Some("volume must be positive")
        } else if order.order_type == OrderType::Market && last.is_none() {
            Some("no last price to fill against")
        } else if order.is_conditional() && order.stop_price.is_none() {
            Some("conditional order without a stop price")
        } else {
            None
        };
        if let Some(reason) = refusal {
            order.state = OrderState::Failed;
            self.remember(&order);
            self.refuse_registration(order.clone(), reason);
            return Ok(order);
        }

        order.state = OrderState::Active;
        self.remember(&order);
        info!(order = %order, "order accepted");
        if order.is_conditional() {
            self.events.new_stop_order.raise(order.clone());
            self.events.new_stop_orders.raise(vec![order.clone()]);
        } else {
            self.events.new_order.raise(order.clone());
            self.events.new_orders.raise(vec![order.clone()]);
        }

        match (order.order_type, last) {
            (OrderType::Market, Some(last)) => {
                let price = self.slipped(order.side, last);
                let id = order.transaction_id;
                match self.execute(&order, price) {
                    Some(filled) => Ok(filled),
                    None => Ok(self.order(id).unwrap_or(order)),
                }
            }
            _ => Ok(order),
        }
    }

    /// Cancel an active order. Anything else is reported as a cancel failure.
    pub fn cancel_order(&self, order: &Order) {
        self.message("order_cancel");
        let canceled = {
            let mut state = self.state.lock();
            match state.orders.get_mut(&order.transaction_id) {
                Some(known) if known.state == OrderState::Active => {
                    known.state = OrderState::Done;
                    Some(known.clone())
                }
                _ => None,
            }
        };

        match canceled {
            Some(order) => {
                info!(order = %order, "order canceled");
                self.announce_change(order);
            }
            None => {
                let fail = OrderFail {
                    order: order.clone(),
                    error: PlatformError::new("order is not active"),
                    time: self.current_time(),
                };
                warn!(order = %order, "cancel refused");
                if order.is_conditional() {
                    self.events.stop_order_cancel_failed.raise(fail.clone());
                    self.events.stop_orders_cancel_failed.raise(vec![fail]);
                } else {
                    self.events.order_cancel_failed.raise(fail.clone());
                    self.events.orders_cancel_failed.raise(vec![fail]);
                }
            }
        }
    }

    /// Cancel every active order. Returns the transaction id of the request.
    pub fn cancel_orders(&self) -> u64 {
        let transaction_id = next_transaction_id();
        if !self.is_connected() {
            self.events
                .mass_order_cancel_failed
                .raise(transaction_id, PlatformError::new("not connected"));
            return transaction_id;
        }
        let active: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| o.state == OrderState::Active)
            .cloned()
            .collect();
        for order in &active {
            self.cancel_order(order);
        }
        info!(transaction_id, canceled = active.len(), "mass cancel");
        self.events.mass_order_canceled.raise(transaction_id);
        transaction_id
    }

    /// Re-announce the current state of an order.
    pub fn request_order_status(&self, transaction_id: u64) {
        match self.order(transaction_id) {
            Some(order) => self.announce_change(order),
            None => self
                .events
                .order_status_failed
                .raise(transaction_id, PlatformError::new("unknown order")),
        }
    }

    pub fn order(&self, transaction_id: u64) -> Option<Order> {
        self.state.lock().orders.get(&transaction_id).cloned()
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn known_security(&self, security_id: &str) -> Result<Security> {
        self.securities
            .lookup_security(security_id)
            .ok_or_else(|| Error::UnknownSecurity(security_id.to_string()))
    }

    fn remember(&self, order: &Order) {
        self.state
            .lock()
            .orders
            .insert(order.transaction_id, order.clone());
    }

    /// Buys pay more, sells receive less.
    fn slipped(&self, side: OrderSide, price: f64) -> f64 {
        let factor = self.slippage_bps / 10_000.0;
        match side {
            OrderSide::Buy => price * (1.0 + factor),
            OrderSide::Sell => price * (1.0 - factor),
        }
    }

    fn refuse_registration(&self, order: Order, reason: &str) {
        warn!(order = %order, reason, "order refused");
        let fail = OrderFail {
            order,
            error: PlatformError::new(reason),
            time: self.current_time(),
        };
        if fail.order.is_conditional() {
            self.events.stop_order_register_failed.raise(fail.clone());
            self.events.stop_orders_register_failed.raise(vec![fail]);
        } else {
            self.events.order_register_failed.raise(fail.clone());
            self.events.orders_register_failed.raise(vec![fail]);
        }
    }

    fn announce_change(&self, order: Order) {
        if order.is_conditional() {
            self.events.stop_order_changed.raise(order.clone());
            self.events.stop_orders_changed.raise(vec![order]);
        } else {
            self.events.order_changed.raise(order.clone());
            self.events.orders_changed.raise(vec![order]);
        }
    }

    /// Fill the whole balance of an active order at `price`.
    /// Fill the stored copy of `order` at `price`. Returns `None` when it is
    /// no longer active, e.g. canceled by a subscriber of an earlier fill.
    fn execute(&self, order: &Order, price: f64) -> Option<Order> {
        let (order, volume) = {
            let mut state = self.state.lock();
            let stored = state.orders.get_mut(&order.transaction_id)?;
            if stored.state != OrderState::Active {
                return None;
            }
            let volume = stored.balance;
            stored.balance = 0.0;
            stored.state = OrderState::Done;
            (stored.clone(), volume)
        };

        let mut trade = Trade::new(&order.security_id, price, volume, self.current_time());
        trade.side = Some(order.side);
        info!(
            order = order.transaction_id,
            side = %order.side,
            price,
            volume,
            "paper fill"
        );

        self.announce_change(order.clone());
        let my_trade = MyTrade {
            order: order.clone(),
            trade,
            commission: None,
        };
        self.events.new_my_trade.raise(my_trade.clone());
        self.events.new_my_trades.raise(vec![my_trade]);

        if let Some(change) = self.portfolios.apply_fill(
            &order.portfolio,
            &order.security_id,
            order.side,
            volume,
            price,
        ) {
            self.announce_account(change);
        }
        Some(order)
    }

    fn announce_account(&self, change: AccountChange) {
        let AccountChange {
            portfolio,
            position,
            opened,
        } = change;
        if opened {
            self.events.new_position.raise(position.clone());
            self.events.new_positions.raise(vec![position]);
        } else {
            self.events.position_changed.raise(position.clone());
            self.events.positions_changed.raise(vec![position]);
        }
        self.events.portfolio_changed.raise(portfolio.clone());
        self.events.portfolios_changed.raise(vec![portfolio]);
    }

    /// Fill resting limit orders the trade crossed and trigger stops.
    fn match_resting(&self, trade: &Trade) {
        let mut crossed: Vec<Order> = self
            .state
            .lock()
            .orders
            .values()
            .filter(|o| o.state == OrderState::Active && o.security_id == trade.security_id)
            .filter(|o| crosses(o, trade.price))
            .cloned()
            .collect();
        crossed.sort_by_key(|o| o.transaction_id);

        for order in &crossed {
            let price = match order.order_type {
                OrderType::Limit => order.price,
                _ => self.slipped(order.side, trade.price),
            };
            if self.execute(order, price).is_none() {
                debug!(order = order.transaction_id, "crossed order left the book before its fill");
            }
        }
    }

    fn set_level1(&self, security: &Security, changes: Vec<(Level1Field, f64)>) {
        let now = {
            let mut state = self.state.lock();
            for &(field, value) in &changes {
                state.level1.insert((security.id.clone(), field), value);
            }
            state.now
        };
        self.market_data
            .values_changed
            .raise(security.clone(), changes, now, Utc::now());
        self.events.security_changed.raise(security.clone());
        self.events.securities_changed.raise(vec![security.clone()]);
    }

    fn message(&self, kind: &str) {
        self.events.new_message.raise(Message {
            adapter: ADAPTER.to_string(),
            kind: kind.to_string(),
            time: self.current_time(),
        });
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.logs.log.raise(LogMessage {
            source: ADAPTER.to_string(),
            level,
            message: message.to_string(),
            time: self.current_time(),
        });
    }
}

fn adapter() -> MessageAdapter {
    MessageAdapter {
        name: ADAPTER.to_string(),
    }
}

/// Whether a trade at `price` reaches a resting order.
fn crosses(order: &Order, price: f64) -> bool {
    match (order.order_type, order.side) {
        (OrderType::Limit, OrderSide::Buy) => price <= order.price,
        (OrderType::Limit, OrderSide::Sell) => price >= order.price,
        (OrderType::Conditional, OrderSide::Buy) => order.stop_price.is_some_and(|stop| price >= stop),
        (OrderType::Conditional, OrderSide::Sell) => order.stop_price.is_some_and(|stop| price <= stop),
        (OrderType::Market, _) => false,
    }
}

impl Connector for PaperConnector {
    fn connector_events(&self) -> &ConnectorEvents {
        &self.events
    }

    fn current_time(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    fn security_value(&self, security_id: &str, field: Level1Field) -> Option<f64> {
        self.state
            .lock()
            .level1
            .get(&(security_id.to_string(), field))
            .copied()
    }
}

impl MarketDataProvider for PaperConnector {
    fn market_data_events(&self) -> &MarketDataProviderEvents {
        &self.market_data
    }
}

impl LogSource for PaperConnector {
    fn log_events(&self) -> &LogSourceEvents {
        &self.logs
    }
}
