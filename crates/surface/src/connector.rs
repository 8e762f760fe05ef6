use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use common::{
    Candle, CandleSeries, ExchangeBoard, Level1Field, MarketDataFailure, MarketDataMessage,
    MarketDataSuccess, MarketDepth, Message, MessageAdapter, MyTrade, News, Order, OrderFail,
    OrderLogItem, PlatformError, Portfolio, PortfolioLookup, Position, Security, SecurityLookup,
    SeriesCandle, SessionChange, SessionState, Trade, TransactionFailure,
};
use rx::{from_event, from_event0, from_event2, from_event3, Event0, Event1, Event2, Event3, Observable};

use crate::hook;

/// Every event a trading connection publishes.
#[derive(Default)]
pub struct ConnectorEvents {
    // Connection lifecycle
    pub connected: Event0,
    pub disconnected: Event0,
    pub connected_ex: Event1<MessageAdapter>,
    pub disconnected_ex: Event1<MessageAdapter>,
    pub connection_error: Event1<PlatformError>,
    pub error: Event1<PlatformError>,
    pub restored: Event0,
    pub timeout: Event0,
    pub market_time_changed: Event1<Duration>,
    pub session_state_changed: Event2<ExchangeBoard, SessionState>,
    pub new_message: Event1<Message>,

    // Candles
    pub candle_series_processing: Event2<CandleSeries, Candle>,
    pub candle_series_stopped: Event1<CandleSeries>,

    // Lookups and market-data subscriptions
    pub lookup_portfolios_result: Event2<Option<PlatformError>, Vec<Portfolio>>,
    pub lookup_securities_result: Event2<Option<PlatformError>, Vec<Security>>,
    pub market_data_subscription_succeeded: Event2<Security, MarketDataMessage>,
    pub market_data_subscription_failed: Event3<Security, MarketDataMessage, PlatformError>,
    pub market_data_unsubscription_succeeded: Event2<Security, MarketDataMessage>,
    pub market_data_unsubscription_failed: Event3<Security, MarketDataMessage, PlatformError>,

    // Market data
    pub market_depth_changed: Event1<MarketDepth>,
    pub market_depths_changed: Event1<Vec<MarketDepth>>,
    pub new_market_depth: Event1<MarketDepth>,
    pub new_market_depths: Event1<Vec<MarketDepth>>,
    pub new_trade: Event1<Trade>,
    pub new_trades: Event1<Vec<Trade>>,
    pub new_order_log_item: Event1<OrderLogItem>,
    pub new_order_log_items: Event1<Vec<OrderLogItem>>,
    pub new_news: Event1<News>,
    pub news_changed: Event1<News>,
    pub new_security: Event1<Security>,
    pub new_securities: Event1<Vec<Security>>,
    pub security_changed: Event1<Security>,
    pub securities_changed: Event1<Vec<Security>>,

    // Orders
    pub new_order: Event1<Order>,
    pub new_orders: Event1<Vec<Order>>,
    pub order_changed: Event1<Order>,
    pub orders_changed: Event1<Vec<Order>>,
    pub order_register_failed: Event1<OrderFail>,
    pub orders_register_failed: Event1<Vec<OrderFail>>,
    pub order_cancel_failed: Event1<OrderFail>,
    pub orders_cancel_failed: Event1<Vec<OrderFail>>,
    pub order_status_failed: Event2<u64, PlatformError>,
    pub mass_order_canceled: Event1<u64>,
    pub mass_order_cancel_failed: Event2<u64, PlatformError>,
    pub new_my_trade: Event1<MyTrade>,
    pub new_my_trades: Event1<Vec<MyTrade>>,

    // Stop orders
    pub new_stop_order: Event1<Order>,
    pub new_stop_orders: Event1<Vec<Order>>,
    pub stop_order_changed: Event1<Order>,
    pub stop_orders_changed: Event1<Vec<Order>>,
    pub stop_order_register_failed: Event1<OrderFail>,
    pub stop_orders_register_failed: Event1<Vec<OrderFail>>,
    pub stop_order_cancel_failed: Event1<OrderFail>,
    pub stop_orders_cancel_failed: Event1<Vec<OrderFail>>,

    // Accounts
    pub new_portfolios: Event1<Vec<Portfolio>>,
    pub portfolio_changed: Event1<Portfolio>,
    pub portfolios_changed: Event1<Vec<Portfolio>>,
    pub new_position: Event1<Position>,
    pub new_positions: Event1<Vec<Position>>,
    pub position_changed: Event1<Position>,
    pub positions_changed: Event1<Vec<Position>>,
}

/// A connection to a trading system.
pub trait Connector: Send + Sync + 'static {
    fn connector_events(&self) -> &ConnectorEvents;

    /// Current market (exchange) time.
    fn current_time(&self) -> DateTime<Utc>;

    /// Latest Level1 value of a security, if known.
    fn security_value(&self, security_id: &str, field: Level1Field) -> Option<f64>;
}

/// Observable view of every [`Connector`] event.
pub trait RxConnector {
    type Source: Connector + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    // ─── Connection lifecycle ─────────────────────────────────────────────

    fn rx_connected(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |c| &c.connector_events().connected))
    }

    fn rx_disconnected(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |c| &c.connector_events().disconnected))
    }

    /// Adapter connections. Completes when an adapter disconnects.
    fn rx_connected_ex(&self) -> Observable<MessageAdapter> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().connected_ex))
            .complete_on(hook(self.rx_source(), |c| &c.connector_events().disconnected_ex))
    }

    fn rx_disconnected_ex(&self) -> Observable<MessageAdapter> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().disconnected_ex))
    }

    fn rx_connection_error(&self) -> Observable<PlatformError> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().connection_error))
    }

    fn rx_error(&self) -> Observable<PlatformError> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().error))
    }

    fn rx_restored(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |c| &c.connector_events().restored))
    }

    fn rx_timeout(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |c| &c.connector_events().timeout))
    }

    /// Market time elapsed since the previous change.
    fn rx_market_time_changed(&self) -> Observable<Duration> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().market_time_changed))
    }

    fn rx_session_state_changed(&self) -> Observable<SessionChange> {
        from_event2(
            hook(self.rx_source(), |c| &c.connector_events().session_state_changed),
            |board, state| SessionChange { board, state },
        )
    }

    fn rx_new_message(&self) -> Observable<Message> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_message))
    }

    // ─── Candles ──────────────────────────────────────────────────────────

    /// Candle updates. Completes when a series stops.
    fn rx_candle_series_processing(&self) -> Observable<SeriesCandle> {
        from_event2(
            hook(self.rx_source(), |c| &c.connector_events().candle_series_processing),
            |series, candle| SeriesCandle { series, candle },
        )
        .complete_on(hook(self.rx_source(), |c| &c.connector_events().candle_series_stopped))
    }

    fn rx_candle_series_stopped(&self) -> Observable<CandleSeries> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().candle_series_stopped))
    }

    // ─── Lookups and subscriptions ────────────────────────────────────────

    fn rx_lookup_portfolios_result(&self) -> Observable<PortfolioLookup> {
        from_event2(
            hook(self.rx_source(), |c| &c.connector_events().lookup_portfolios_result),
            |error, portfolios| PortfolioLookup { error, portfolios },
        )
    }

    fn rx_lookup_securities_result(&self) -> Observable<SecurityLookup> {
        from_event2(
            hook(self.rx_source(), |c| &c.connector_events().lookup_securities_result),
            |error, securities| SecurityLookup { error, securities },
        )
    }

    fn rx_market_data_subscription_succeeded(&self) -> Observable<MarketDataSuccess> {
        from_event2(
            hook(self.rx_source(), |c| {
                &c.connector_events().market_data_subscription_succeeded
            }),
            |security, message| MarketDataSuccess { security, message },
        )
    }

    fn rx_market_data_subscription_failed(&self) -> Observable<MarketDataFailure> {
        from_event3(
            hook(self.rx_source(), |c| &c.connector_events().market_data_subscription_failed),
            |security, message, error| MarketDataFailure {
                security,
                message,
                error,
            },
        )
    }

    fn rx_market_data_unsubscription_succeeded(&self) -> Observable<MarketDataSuccess> {
        from_event2(
            hook(self.rx_source(), |c| {
                &c.connector_events().market_data_unsubscription_succeeded
            }),
            |security, message| MarketDataSuccess { security, message },
        )
    }

    fn rx_market_data_unsubscription_failed(&self) -> Observable<MarketDataFailure> {
        from_event3(
            hook(self.rx_source(), |c| {
                &c.connector_events().market_data_unsubscription_failed
            }),
            |security, message, error| MarketDataFailure {
                security,
                message,
                error,
            },
        )
    }

    // ─── Market data ──────────────────────────────────────────────────────

    fn rx_market_depth_changed(&self) -> Observable<MarketDepth> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().market_depth_changed))
    }

    fn rx_market_depths_changed(&self) -> Observable<Vec<MarketDepth>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().market_depths_changed))
    }

    fn rx_new_market_depth(&self) -> Observable<MarketDepth> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_market_depth))
    }

    fn rx_new_market_depths(&self) -> Observable<Vec<MarketDepth>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_market_depths))
    }

    fn rx_new_trade(&self) -> Observable<Trade> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_trade))
    }

    fn rx_new_trades(&self) -> Observable<Vec<Trade>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_trades))
    }

    fn rx_new_order_log_item(&self) -> Observable<OrderLogItem> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_order_log_item))
    }

    fn rx_new_order_log_items(&self) -> Observable<Vec<OrderLogItem>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_order_log_items))
    }

    fn rx_new_news(&self) -> Observable<News> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_news))
    }

    fn rx_news_changed(&self) -> Observable<News> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().news_changed))
    }

    fn rx_new_security(&self) -> Observable<Security> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_security))
    }

    fn rx_new_securities(&self) -> Observable<Vec<Security>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_securities))
    }

    fn rx_security_changed(&self) -> Observable<Security> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().security_changed))
    }

    fn rx_securities_changed(&self) -> Observable<Vec<Security>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().securities_changed))
    }

    // ─── Orders ───────────────────────────────────────────────────────────

    fn rx_new_order(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_order))
    }

    fn rx_new_orders(&self) -> Observable<Vec<Order>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_orders))
    }

    fn rx_order_changed(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().order_changed))
    }

    fn rx_orders_changed(&self) -> Observable<Vec<Order>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().orders_changed))
    }

    fn rx_order_register_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().order_register_failed))
    }

    fn rx_orders_register_failed(&self) -> Observable<Vec<OrderFail>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().orders_register_failed))
    }

    fn rx_order_cancel_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().order_cancel_failed))
    }

    fn rx_orders_cancel_failed(&self) -> Observable<Vec<OrderFail>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().orders_cancel_failed))
    }

    fn rx_order_status_failed(&self) -> Observable<TransactionFailure> {
        from_event2(
            hook(self.rx_source(), |c| &c.connector_events().order_status_failed),
            |transaction_id, error| TransactionFailure {
                transaction_id,
                error,
            },
        )
    }

    fn rx_mass_order_canceled(&self) -> Observable<u64> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().mass_order_canceled))
    }

    fn rx_mass_order_cancel_failed(&self) -> Observable<TransactionFailure> {
        from_event2(
            hook(self.rx_source(), |c| &c.connector_events().mass_order_cancel_failed),
            |transaction_id, error| TransactionFailure {
                transaction_id,
                error,
            },
        )
    }

    fn rx_new_my_trade(&self) -> Observable<MyTrade> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_my_trade))
    }

    fn rx_new_my_trades(&self) -> Observable<Vec<MyTrade>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_my_trades))
    }

    // ─── Stop orders ──────────────────────────────────────────────────────

    fn rx_new_stop_order(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_stop_order))
    }

    fn rx_new_stop_orders(&self) -> Observable<Vec<Order>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_stop_orders))
    }

    fn rx_stop_order_changed(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().stop_order_changed))
    }

    fn rx_stop_orders_changed(&self) -> Observable<Vec<Order>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().stop_orders_changed))
    }

    fn rx_stop_order_register_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().stop_order_register_failed))
    }

    fn rx_stop_orders_register_failed(&self) -> Observable<Vec<OrderFail>> {
        from_event(hook(self.rx_source(), |c| {
            &c.connector_events().stop_orders_register_failed
        }))
    }

    fn rx_stop_order_cancel_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().stop_order_cancel_failed))
    }

    fn rx_stop_orders_cancel_failed(&self) -> Observable<Vec<OrderFail>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().stop_orders_cancel_failed))
    }

    // ─── Accounts ─────────────────────────────────────────────────────────

    fn rx_new_portfolios(&self) -> Observable<Vec<Portfolio>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_portfolios))
    }

    fn rx_portfolio_changed(&self) -> Observable<Portfolio> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().portfolio_changed))
    }

    fn rx_portfolios_changed(&self) -> Observable<Vec<Portfolio>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().portfolios_changed))
    }

    fn rx_new_position(&self) -> Observable<Position> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_position))
    }

    fn rx_new_positions(&self) -> Observable<Vec<Position>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().new_positions))
    }

    fn rx_position_changed(&self) -> Observable<Position> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().position_changed))
    }

    fn rx_positions_changed(&self) -> Observable<Vec<Position>> {
        from_event(hook(self.rx_source(), |c| &c.connector_events().positions_changed))
    }
}

impl<S: Connector + ?Sized> RxConnector for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}
