use std::sync::Arc;

use common::{Level1Field, MarketDepth, OrderLogItem, Security, Trade, Unit};
use rx::Observable;
use surface::{Connector, RxConnector};
use tracing::debug;

/// Rules watching one security. A basket security matches events of any of
/// its legs.
///
/// Price rules resolve relative units against the security's Level1 value
/// at creation, or against zero when the connector has none yet.
pub trait SecurityRules {
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Security>
    where
        C: Connector + ?Sized;

    fn when_new_trade<C>(&self, connector: &Arc<C>) -> Observable<Trade>
    where
        C: Connector + ?Sized;

    fn when_new_order_log_item<C>(&self, connector: &Arc<C>) -> Observable<OrderLogItem>
    where
        C: Connector + ?Sized;

    fn when_market_depth_changed<C>(&self, connector: &Arc<C>) -> Observable<MarketDepth>
    where
        C: Connector + ?Sized;

    fn when_best_bid_price_more<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized;

    fn when_best_bid_price_less<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized;

    fn when_best_ask_price_more<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized;

    fn when_best_ask_price_less<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized;

    fn when_last_trade_price_more<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Trade>
    where
        C: Connector + ?Sized;

    fn when_last_trade_price_less<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Trade>
    where
        C: Connector + ?Sized;
}

#[derive(Clone, Copy)]
enum Cross {
    Above,
    Below,
}

impl Cross {
    fn level(self, unit: Unit, base: f64) -> f64 {
        match self {
            Cross::Above => unit.level_above(base),
            Cross::Below => unit.level_below(base),
        }
    }

    fn passed(self, value: f64, level: f64) -> bool {
        match self {
            Cross::Above => value > level,
            Cross::Below => value < level,
        }
    }
}

fn armed_level<C>(
    security: &Security,
    connector: &Arc<C>,
    field: Level1Field,
    cross: Cross,
    unit: Unit,
) -> f64
where
    C: Connector + ?Sized,
{
    let base = connector.security_value(&security.id, field).unwrap_or(0.0);
    let level = cross.level(unit, base);
    debug!(security = %security.id, ?field, base, level, "price rule armed");
    level
}

fn quote_rule<C>(
    security: &Security,
    connector: &Arc<C>,
    field: Level1Field,
    cross: Cross,
    unit: Unit,
) -> Observable<Security>
where
    C: Connector + ?Sized,
{
    let level = armed_level(security, connector, field, cross, unit);
    let source = Arc::clone(connector);
    security.when_changed(connector).filter(move |changed: &Security| {
        source
            .security_value(&changed.id, field)
            .is_some_and(|quote| cross.passed(quote, level))
    })
}

fn trade_rule<C>(security: &Security, connector: &Arc<C>, cross: Cross, unit: Unit) -> Observable<Trade>
where
    C: Connector + ?Sized,
{
    let level = armed_level(security, connector, Level1Field::LastTradePrice, cross, unit);
    security
        .when_new_trade(connector)
        .filter(move |trade: &Trade| cross.passed(trade.price, level))
}

impl SecurityRules for Security {
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Security>
    where
        C: Connector + ?Sized,
    {
        let watched = self.clone();
        connector
            .rx_security_changed()
            .filter(move |security: &Security| watched.contains(&security.id))
    }

    fn when_new_trade<C>(&self, connector: &Arc<C>) -> Observable<Trade>
    where
        C: Connector + ?Sized,
    {
        let watched = self.clone();
        connector
            .rx_new_trade()
            .filter(move |trade: &Trade| watched.contains(&trade.security_id))
    }

    fn when_new_order_log_item<C>(&self, connector: &Arc<C>) -> Observable<OrderLogItem>
    where
        C: Connector + ?Sized,
    {
        let watched = self.clone();
        connector
            .rx_new_order_log_item()
            .filter(move |item: &OrderLogItem| watched.contains(&item.order.security_id))
    }

    fn when_market_depth_changed<C>(&self, connector: &Arc<C>) -> Observable<MarketDepth>
    where
        C: Connector + ?Sized,
    {
        let watched = self.clone();
        connector
            .rx_market_depth_changed()
            .filter(move |depth: &MarketDepth| watched.contains(&depth.security_id))
    }

    fn when_best_bid_price_more<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized,
    {
        quote_rule(self, connector, Level1Field::BestBidPrice, Cross::Above, price)
    }

    fn when_best_bid_price_less<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized,
    {
        quote_rule(self, connector, Level1Field::BestBidPrice, Cross::Below, price)
    }

    fn when_best_ask_price_more<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized,
    {
        quote_rule(self, connector, Level1Field::BestAskPrice, Cross::Above, price)
    }

    fn when_best_ask_price_less<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Security>
    where
        C: Connector + ?Sized,
    {
        quote_rule(self, connector, Level1Field::BestAskPrice, Cross::Below, price)
    }

    fn when_last_trade_price_more<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Trade>
    where
        C: Connector + ?Sized,
    {
        trade_rule(self, connector, Cross::Above, price)
    }

    fn when_last_trade_price_less<C>(&self, connector: &Arc<C>, price: Unit) -> Observable<Trade>
    where
        C: Connector + ?Sized,
    {
        trade_rule(self, connector, Cross::Below, price)
    }
}
