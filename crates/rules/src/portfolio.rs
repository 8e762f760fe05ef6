use std::sync::Arc;

use common::{Portfolio, Position, Unit};
use rx::Observable;
use surface::{Connector, RxConnector};
use tracing::debug;

// ─── Portfolio ───────────────────────────────────────────────────────────────

pub trait PortfolioRules {
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Portfolio>
    where
        C: Connector + ?Sized;

    /// Current value drops below `money`, resolved against the current
    /// value at creation.
    fn when_money_less<C>(&self, connector: &Arc<C>, money: Unit) -> Observable<Portfolio>
    where
        C: Connector + ?Sized;

    fn when_money_more<C>(&self, connector: &Arc<C>, money: Unit) -> Observable<Portfolio>
    where
        C: Connector + ?Sized;
}

impl PortfolioRules for Portfolio {
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Portfolio>
    where
        C: Connector + ?Sized,
    {
        let name = self.name.clone();
        connector
            .rx_portfolio_changed()
            .filter(move |p: &Portfolio| p.name == name)
    }

    fn when_money_less<C>(&self, connector: &Arc<C>, money: Unit) -> Observable<Portfolio>
    where
        C: Connector + ?Sized,
    {
        let level = money.level_below(self.current_value);
        debug!(portfolio = %self.name, level, "money-less rule armed");
        self.when_changed(connector)
            .filter(move |p: &Portfolio| p.current_value < level)
    }

    fn when_money_more<C>(&self, connector: &Arc<C>, money: Unit) -> Observable<Portfolio>
    where
        C: Connector + ?Sized,
    {
        let level = money.level_above(self.current_value);
        debug!(portfolio = %self.name, level, "money-more rule armed");
        self.when_changed(connector)
            .filter(move |p: &Portfolio| p.current_value > level)
    }
}

// ─── Position ────────────────────────────────────────────────────────────────

pub trait PositionRules {
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Position>
    where
        C: Connector + ?Sized;

    fn when_less<C>(&self, connector: &Arc<C>, value: Unit) -> Observable<Position>
    where
        C: Connector + ?Sized;

    fn when_more<C>(&self, connector: &Arc<C>, value: Unit) -> Observable<Position>
    where
        C: Connector + ?Sized;
}

impl PositionRules for Position {
    fn when_changed<C>(&self, connector: &Arc<C>) -> Observable<Position>
    where
        C: Connector + ?Sized,
    {
        let position = self.clone();
        connector
            .rx_position_changed()
            .filter(move |p: &Position| p.same_as(&position))
    }

    fn when_less<C>(&self, connector: &Arc<C>, value: Unit) -> Observable<Position>
    where
        C: Connector + ?Sized,
    {
        let level = value.level_below(self.current_value);
        self.when_changed(connector)
            .filter(move |p: &Position| p.current_value < level)
    }

    fn when_more<C>(&self, connector: &Arc<C>, value: Unit) -> Observable<Position>
    where
        C: Connector + ?Sized,
    {
        let level = value.level_above(self.current_value);
        self.when_changed(connector)
            .filter(move |p: &Position| p.current_value > level)
    }
}
