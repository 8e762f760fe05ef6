use std::sync::Arc;

use common::{MyTrade, Order, OrderFail};
use rx::Observable;
use surface::{Connector, RxConnector};

/// Rules watching one order. Orders are matched by transaction id;
/// conditional orders are followed through the stop-order events.
pub trait OrderRules {
    fn when_register_failed<C>(&self, connector: &Arc<C>) -> Observable<OrderFail>
    where
        C: Connector + ?Sized;

    fn when_cancel_failed<C>(&self, connector: &Arc<C>) -> Observable<OrderFail>
    where
        C: Connector + ?Sized;

    /// The order finished with volume left unfilled.
    fn when_canceled<C>(&self, connector: &Arc<C>) -> Observable<Order>
    where
        C: Connector + ?Sized;

    /// The fill that completed the order.
    fn when_matched<C>(&self, connector: &Arc<C>) -> Observable<MyTrade>
    where
        C: Connector + ?Sized;

    /// New and changed snapshots of the order.
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Order>
    where
        C: Connector + ?Sized;

    fn when_new_trade<C>(&self, connector: &Arc<C>) -> Observable<MyTrade>
    where
        C: Connector + ?Sized;
}

impl OrderRules for Order {
    fn when_register_failed<C>(&self, connector: &Arc<C>) -> Observable<OrderFail>
    where
        C: Connector + ?Sized,
    {
        let failures = if self.is_conditional() {
            connector.rx_stop_order_register_failed()
        } else {
            connector.rx_order_register_failed()
        };
        let order = self.clone();
        failures.filter(move |fail: &OrderFail| fail.order.same_as(&order))
    }

    fn when_cancel_failed<C>(&self, connector: &Arc<C>) -> Observable<OrderFail>
    where
        C: Connector + ?Sized,
    {
        let failures = if self.is_conditional() {
            connector.rx_stop_order_cancel_failed()
        } else {
            connector.rx_order_cancel_failed()
        };
        let order = self.clone();
        failures.filter(move |fail: &OrderFail| fail.order.same_as(&order))
    }

    fn when_canceled<C>(&self, connector: &Arc<C>) -> Observable<Order>
    where
        C: Connector + ?Sized,
    {
        self.when_changed(connector)
            .filter(|order: &Order| order.is_canceled())
    }

    fn when_matched<C>(&self, connector: &Arc<C>) -> Observable<MyTrade>
    where
        C: Connector + ?Sized,
    {
        self.when_new_trade(connector)
            .filter(|trade: &MyTrade| trade.order.is_matched())
    }

    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Order>
    where
        C: Connector + ?Sized,
    {
        let (changed, new) = if self.is_conditional() {
            (connector.rx_stop_order_changed(), connector.rx_new_stop_order())
        } else {
            (connector.rx_order_changed(), connector.rx_new_order())
        };
        let order = self.clone();
        changed
            .merge(new)
            .filter(move |snapshot: &Order| snapshot.same_as(&order))
    }

    fn when_new_trade<C>(&self, connector: &Arc<C>) -> Observable<MyTrade>
    where
        C: Connector + ?Sized,
    {
        let order = self.clone();
        connector
            .rx_new_my_trade()
            .filter(move |trade: &MyTrade| trade.order.same_as(&order))
    }
}
