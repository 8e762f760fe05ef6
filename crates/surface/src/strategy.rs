use std::sync::Arc;

use common::{Candle, CandleSeries, MyTrade, Order, OrderFail, OrderReplacement, PlatformError, Position, ProcessState, SeriesCandle};
use rx::{from_event, from_event0, from_event2, from_source, Event0, Event1, Event2, Observable};

use crate::candles::{CandleSource, RxCandleSource};
use crate::connector::Connector;
use crate::hook;

#[derive(Default)]
pub struct StrategyEvents {
    // Settings and state
    pub commission_changed: Event0,
    pub connector_changed: Event0,
    pub latency_changed: Event0,
    pub parameters_changed: Event0,
    pub pnl_changed: Event0,
    pub portfolio_changed: Event0,
    pub position_changed: Event0,
    pub security_changed: Event0,
    pub slippage_changed: Event0,
    pub position_changed2: Event1<Position>,
    pub process_state_changed: Event1<ProcessState>,
    /// Name of the property that changed.
    pub property_changed: Event1<String>,
    pub reseted: Event0,
    pub error: Event1<PlatformError>,

    // Own orders
    pub new_my_trade: Event1<MyTrade>,
    pub order_registering: Event1<Order>,
    pub order_registered: Event1<Order>,
    pub order_register_failed: Event1<OrderFail>,
    pub order_canceling: Event1<Order>,
    pub order_cancel_failed: Event1<OrderFail>,
    pub order_re_registering: Event2<Order, Order>,

    // Own stop orders
    pub stop_order_registering: Event1<Order>,
    pub stop_order_registered: Event1<Order>,
    pub stop_order_register_failed: Event1<OrderFail>,
    pub stop_order_changed: Event1<Order>,
    pub stop_order_canceling: Event1<Order>,
    pub stop_order_cancel_failed: Event1<OrderFail>,
    pub stop_order_re_registering: Event2<Order, Order>,
}

/// A trading strategy running on top of a connector.
pub trait Strategy: Send + Sync + 'static {
    fn strategy_events(&self) -> &StrategyEvents;

    /// The connection the strategy trades through, once attached.
    fn connector(&self) -> Option<Arc<dyn Connector>>;

    /// The candle source the strategy reads, once attached.
    fn candle_manager(&self) -> Option<Arc<dyn CandleSource>>;
}

pub trait RxStrategy {
    type Source: Strategy + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    // ─── Settings and state ───────────────────────────────────────────────

    fn rx_commission_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().commission_changed))
    }

    fn rx_connector_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().connector_changed))
    }

    fn rx_latency_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().latency_changed))
    }

    fn rx_parameters_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().parameters_changed))
    }

    fn rx_pnl_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().pnl_changed))
    }

    fn rx_portfolio_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().portfolio_changed))
    }

    fn rx_position_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().position_changed))
    }

    fn rx_security_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().security_changed))
    }

    fn rx_slippage_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().slippage_changed))
    }

    fn rx_position_changed2(&self) -> Observable<Position> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().position_changed2))
    }

    fn rx_process_state_changed(&self) -> Observable<ProcessState> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().process_state_changed))
    }

    fn rx_property_changed(&self) -> Observable<String> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().property_changed))
    }

    fn rx_reseted(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |s| &s.strategy_events().reseted))
    }

    fn rx_error(&self) -> Observable<PlatformError> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().error))
    }

    // ─── Orders ───────────────────────────────────────────────────────────

    fn rx_new_my_trade(&self) -> Observable<MyTrade> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().new_my_trade))
    }

    fn rx_order_registering(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().order_registering))
    }

    fn rx_order_registered(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().order_registered))
    }

    fn rx_order_register_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().order_register_failed))
    }

    fn rx_order_canceling(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().order_canceling))
    }

    fn rx_order_cancel_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().order_cancel_failed))
    }

    fn rx_order_re_registering(&self) -> Observable<OrderReplacement> {
        from_event2(
            hook(self.rx_source(), |s| &s.strategy_events().order_re_registering),
            |old, new| OrderReplacement { old, new },
        )
    }

    // ─── Stop orders ──────────────────────────────────────────────────────

    fn rx_stop_order_registering(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().stop_order_registering))
    }

    fn rx_stop_order_registered(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().stop_order_registered))
    }

    fn rx_stop_order_register_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |s| {
            &s.strategy_events().stop_order_register_failed
        }))
    }

    fn rx_stop_order_changed(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().stop_order_changed))
    }

    fn rx_stop_order_canceling(&self) -> Observable<Order> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().stop_order_canceling))
    }

    fn rx_stop_order_cancel_failed(&self) -> Observable<OrderFail> {
        from_event(hook(self.rx_source(), |s| &s.strategy_events().stop_order_cancel_failed))
    }

    fn rx_stop_order_re_registering(&self) -> Observable<OrderReplacement> {
        from_event2(
            hook(self.rx_source(), |s| &s.strategy_events().stop_order_re_registering),
            |old, new| OrderReplacement { old, new },
        )
    }

    // ─── Candles ──────────────────────────────────────────────────────────

    /// Candles of `series` from the strategy's candle manager.
    ///
    /// Fails with [`rx::Error::MissingSource`] when no candle manager is
    /// attached yet.
    fn rx_strategy_candles(&self, series: &CandleSeries) -> rx::Result<Observable<Candle>> {
        let manager = self.rx_source().candle_manager();
        let series = series.clone();
        from_source(manager.as_ref(), "candle manager", move |manager| {
            manager
                .rx_processing()
                .filter(move |update: &SeriesCandle| update.series == series)
                .map(|update: SeriesCandle| update.candle)
        })
    }
}

impl<S: Strategy + ?Sized> RxStrategy for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}
