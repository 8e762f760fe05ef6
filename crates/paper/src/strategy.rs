use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use common::{
    Level1Field, MyTrade, Order, OrderFail, OrderSide, OrderState, PlatformError, Position,
    ProcessState, Result,
};
use surface::{CandleSource, Connector, RxConnector, Strategy, StrategyEvents};

use crate::candles::PaperCandleManager;
use crate::connector::PaperConnector;

/// Routes one security's orders for one portfolio through the paper
/// connector and republishes what happens to them as strategy events.
pub struct PaperStrategy {
    core: Arc<StrategyCore>,
    connector: Arc<PaperConnector>,
    candles: Option<Arc<PaperCandleManager>>,
    links: Mutex<Option<rx::CompositeSubscription>>,
}

struct StrategyCore {
    events: StrategyEvents,
    name: String,
    portfolio: Mutex<String>,
    security_id: Mutex<String>,
    own: Mutex<HashSet<u64>>,
    book: Mutex<Book>,
}

#[derive(Default)]
struct Book {
    state: ProcessState,
    position: f64,
    /// Cash paid out (negative) or received for own fills.
    cash: f64,
}

impl PaperStrategy {
    pub fn new(
        name: &str,
        connector: &Arc<PaperConnector>,
        candles: Option<Arc<PaperCandleManager>>,
        portfolio: &str,
        security_id: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: Arc::new(StrategyCore {
                events: StrategyEvents::default(),
                name: name.to_string(),
                portfolio: Mutex::new(portfolio.to_string()),
                security_id: Mutex::new(security_id.to_string()),
                own: Mutex::new(HashSet::new()),
                book: Mutex::new(Book::default()),
            }),
            connector: Arc::clone(connector),
            candles,
            links: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn process_state(&self) -> ProcessState {
        self.core.book.lock().state
    }

    pub fn position(&self) -> f64 {
        self.core.book.lock().position
    }

    /// Cash flow of own fills plus the open position at the last price.
    pub fn pnl(&self) -> f64 {
        let (position, cash) = {
            let book = self.core.book.lock();
            (book.position, book.cash)
        };
        let security_id = self.core.security_id.lock().clone();
        let last = self
            .connector
            .security_value(&security_id, Level1Field::LastTradePrice)
            .unwrap_or(0.0);
        cash + position * last
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start listening to the connector for own order activity.
    pub fn start(&self) {
        let mut links = self.links.lock();
        if links.is_some() {
            return;
        }
        let composite = rx::CompositeSubscription::new();
        let connector = &self.connector;

        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_new_my_trade()
                .filter(owned_by(&self.core, |t: &MyTrade| &t.order))
                .subscribe_fn(move |trade| core.on_my_trade(trade)),
        );
        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_order_register_failed()
                .filter(owned_by(&self.core, |f: &OrderFail| &f.order))
                .subscribe_fn(move |fail| core.events.order_register_failed.raise(fail)),
        );
        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_order_cancel_failed()
                .filter(owned_by(&self.core, |f: &OrderFail| &f.order))
                .subscribe_fn(move |fail| core.events.order_cancel_failed.raise(fail)),
        );
        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_stop_order_register_failed()
                .filter(owned_by(&self.core, |f: &OrderFail| &f.order))
                .subscribe_fn(move |fail| core.events.stop_order_register_failed.raise(fail)),
        );
        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_stop_order_cancel_failed()
                .filter(owned_by(&self.core, |f: &OrderFail| &f.order))
                .subscribe_fn(move |fail| core.events.stop_order_cancel_failed.raise(fail)),
        );
        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_stop_order_changed()
                .filter(owned_by(&self.core, |o: &Order| o))
                .subscribe_fn(move |order| core.events.stop_order_changed.raise(order)),
        );
        let core = Arc::clone(&self.core);
        composite.add(
            connector
                .rx_error()
                .merge(connector.rx_connection_error())
                .subscribe_fn(move |error| core.on_error(error)),
        );

        *links = Some(composite);
        drop(links);
        info!(strategy = %self.core.name, "strategy started");
        self.core.set_state(ProcessState::Started);
    }

    /// Stop listening. Open orders stay on the venue.
    pub fn stop(&self) {
        let Some(links) = self.links.lock().take() else {
            return;
        };
        self.core.set_state(ProcessState::Stopping);
        links.dispose();
        info!(strategy = %self.core.name, "strategy stopped");
        self.core.set_state(ProcessState::Stopped);
    }

    /// Forget position and cash.
    pub fn reset(&self) {
        {
            let mut book = self.core.book.lock();
            book.position = 0.0;
            book.cash = 0.0;
        }
        self.core.events.reseted.raise();
        self.core.events.position_changed.raise();
        self.core.events.pnl_changed.raise();
    }

    pub fn set_portfolio(&self, portfolio: &str) {
        *self.core.portfolio.lock() = portfolio.to_string();
        self.core.events.portfolio_changed.raise();
        self.core.events.property_changed.raise("portfolio".to_string());
    }

    pub fn set_security(&self, security_id: &str) {
        *self.core.security_id.lock() = security_id.to_string();
        self.core.events.security_changed.raise();
        self.core.events.property_changed.raise("security".to_string());
    }

    // ─── Orders ──────────────────────────────────────────────────────────

    pub fn buy_market(&self, volume: f64) -> Result<Order> {
        self.register_order(self.market(OrderSide::Buy, volume))
    }

    pub fn sell_market(&self, volume: f64) -> Result<Order> {
        self.register_order(self.market(OrderSide::Sell, volume))
    }

    pub fn limit(&self, side: OrderSide, price: f64, volume: f64) -> Order {
        Order::limit(self.security_id(), self.portfolio(), side, price, volume)
    }

    pub fn conditional(&self, side: OrderSide, stop_price: f64, volume: f64) -> Order {
        Order::conditional(self.security_id(), self.portfolio(), side, stop_price, volume)
    }

    /// Place an order as this strategy's own.
    pub fn register_order(&self, order: Order) -> Result<Order> {
        self.core.own.lock().insert(order.transaction_id);
        let events = &self.core.events;
        if order.is_conditional() {
            events.stop_order_registering.raise(order.clone());
        } else {
            events.order_registering.raise(order.clone());
        }

        let placed = match self.connector.register_order(order) {
            Ok(placed) => placed,
            Err(err) => {
                warn!(strategy = %self.core.name, error = %err, "order rejected");
                return Err(err);
            }
        };
        if placed.state != OrderState::Failed {
            if placed.is_conditional() {
                events.stop_order_registered.raise(placed.clone());
            } else {
                events.order_registered.raise(placed.clone());
            }
        }
        Ok(placed)
    }

    pub fn cancel_order(&self, order: &Order) {
        if order.is_conditional() {
            self.core.events.stop_order_canceling.raise(order.clone());
        } else {
            self.core.events.order_canceling.raise(order.clone());
        }
        self.connector.cancel_order(order);
    }

    /// Cancel `old` and place `new` in its place.
    pub fn re_register_order(&self, old: &Order, new: Order) -> Result<Order> {
        if old.is_conditional() {
            self.core
                .events
                .stop_order_re_registering
                .raise(old.clone(), new.clone());
        } else {
            self.core
                .events
                .order_re_registering
                .raise(old.clone(), new.clone());
        }
        self.cancel_order(old);
        self.register_order(new)
    }

    pub fn market(&self, side: OrderSide, volume: f64) -> Order {
        Order::market(self.security_id(), self.portfolio(), side, volume)
    }

    fn portfolio(&self) -> String {
        self.core.portfolio.lock().clone()
    }

    fn security_id(&self) -> String {
        self.core.security_id.lock().clone()
    }
}

impl Drop for PaperStrategy {
    fn drop(&mut self) {
        if let Some(links) = self.links.lock().take() {
            links.dispose();
        }
    }
}

fn owned_by<T>(
    core: &Arc<StrategyCore>,
    order: fn(&T) -> &Order,
) -> impl Fn(&T) -> bool + Send + Sync + 'static
where
    T: 'static,
{
    let core = Arc::clone(core);
    move |item| core.own.lock().contains(&order(item).transaction_id)
}

impl StrategyCore {
    fn on_my_trade(&self, trade: MyTrade) {
        let position = {
            let mut book = self.book.lock();
            let signed = trade.order.side.sign() * trade.trade.volume;
            book.position += signed;
            book.cash -= signed * trade.trade.price;
            book.position
        };
        self.events.new_my_trade.raise(trade.clone());
        self.events.position_changed.raise();
        self.events.position_changed2.raise(Position {
            portfolio: trade.order.portfolio.clone(),
            security_id: trade.order.security_id.clone(),
            begin_value: 0.0,
            current_value: position,
        });
        self.events.pnl_changed.raise();
    }

    fn on_error(&self, error: PlatformError) {
        warn!(strategy = %self.name, error = %error.message, "connector error");
        self.events.error.raise(error);
    }

    fn set_state(&self, state: ProcessState) {
        self.book.lock().state = state;
        self.events.process_state_changed.raise(state);
    }
}

impl Strategy for PaperStrategy {
    fn strategy_events(&self) -> &StrategyEvents {
        &self.core.events
    }

    fn connector(&self) -> Option<Arc<dyn Connector>> {
        Some(Arc::clone(&self.connector) as Arc<dyn Connector>)
    }

    fn candle_manager(&self) -> Option<Arc<dyn CandleSource>> {
        self.candles
            .as_ref()
            .map(|candles| Arc::clone(candles) as Arc<dyn CandleSource>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::{CandleSeries, Portfolio, Security};
    use rx::Collector;
    use surface::RxStrategy;

    fn setup() -> (Arc<PaperConnector>, Arc<PaperStrategy>) {
        let venue = PaperConnector::new(0.0, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        venue.add_security(Security::new("A", "X"));
        venue.add_portfolio(Portfolio::new("main", 10_000.0));
        venue.connect();
        venue.push_trade("A@X", 100.0, 1.0).unwrap();
        let candles = PaperCandleManager::new(&venue);
        let strategy = PaperStrategy::new("watcher", &venue, Some(candles), "main", "A@X");
        strategy.start();
        (venue, strategy)
    }

    #[test]
    fn own_fills_move_position_and_are_republished() {
        let (_venue, strategy) = setup();
        let trades = Collector::new();
        let positions = Collector::new();
        let _a = strategy.rx_new_my_trade().subscribe(trades.clone());
        let _b = strategy.rx_position_changed2().subscribe(positions.clone());

        strategy.buy_market(2.0).unwrap();
        strategy.sell_market(0.5).unwrap();

        assert_eq!(trades.len(), 2);
        let sizes: Vec<f64> = positions.values().iter().map(|p| p.current_value).collect();
        assert_eq!(sizes, vec![2.0, 1.5]);
        assert_eq!(strategy.position(), 1.5);
        assert_eq!(strategy.pnl(), 0.0);
    }

    #[test]
    fn foreign_orders_are_not_republished() {
        let (venue, strategy) = setup();
        let trades = Collector::new();
        let _sub = strategy.rx_new_my_trade().subscribe(trades.clone());

        venue
            .register_order(Order::market("A@X", "main", OrderSide::Buy, 1.0))
            .unwrap();

        assert!(trades.is_empty());
        assert_eq!(strategy.position(), 0.0);
    }

    #[test]
    fn registering_and_registered_bracket_the_venue_call() {
        let (_venue, strategy) = setup();
        let registering = Collector::new();
        let registered = Collector::new();
        let _a = strategy.rx_order_registering().subscribe(registering.clone());
        let _b = strategy.rx_order_registered().subscribe(registered.clone());

        let order = strategy.limit(OrderSide::Buy, 90.0, 1.0);
        strategy.register_order(order.clone()).unwrap();

        assert!(registering.values()[0].same_as(&order));
        assert_eq!(registered.values()[0].state, OrderState::Active);
    }

    #[test]
    fn refused_orders_surface_as_register_failed() {
        let (venue, strategy) = setup();
        venue.disconnect();
        let failed = Collector::new();
        let registered = Collector::new();
        let _a = strategy.rx_order_register_failed().subscribe(failed.clone());
        let _b = strategy.rx_order_registered().subscribe(registered.clone());

        strategy.buy_market(1.0).unwrap();

        assert_eq!(failed.len(), 1);
        assert!(registered.is_empty());
    }

    #[test]
    fn re_register_cancels_the_old_order() {
        let (venue, strategy) = setup();
        let replacements = Collector::new();
        let _sub = strategy.rx_order_re_registering().subscribe(replacements.clone());

        let old = strategy
            .register_order(strategy.limit(OrderSide::Sell, 120.0, 1.0))
            .unwrap();
        let new = strategy.limit(OrderSide::Sell, 110.0, 1.0);
        strategy.re_register_order(&old, new.clone()).unwrap();

        assert!(venue.order(old.transaction_id).unwrap().is_canceled());
        let pairs = replacements.values();
        assert!(pairs[0].old.same_as(&old) && pairs[0].new.same_as(&new));
    }

    #[test]
    fn stop_detaches_from_the_connector() {
        let (venue, strategy) = setup();
        let states = Collector::new();
        let _sub = strategy.rx_process_state_changed().subscribe(states.clone());

        strategy.stop();
        venue.report_error("gateway down");

        assert_eq!(
            states.values(),
            vec![ProcessState::Stopping, ProcessState::Stopped]
        );
        assert_eq!(strategy.process_state(), ProcessState::Stopped);
        assert!(venue.connector_events().error.is_empty());
    }

    #[test]
    fn connector_errors_reach_the_strategy() {
        let (venue, strategy) = setup();
        let errors = Collector::new();
        let _sub = strategy.rx_error().subscribe(errors.clone());

        venue.report_error("gateway down");
        venue.fail_connection("socket closed");

        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn strategy_candles_come_from_its_manager() {
        let (venue, strategy) = setup();
        let series = CandleSeries::new("A@X", 60);
        if let Some(manager) = &strategy.candles {
            manager.start(&series);
        }
        let seen = Collector::new();
        let _sub = strategy
            .rx_strategy_candles(&series)
            .unwrap()
            .subscribe(seen.clone());

        venue.push_trade("A@X", 101.0, 1.0).unwrap();

        assert_eq!(seen.len(), 1);
    }
}
