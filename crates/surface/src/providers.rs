use std::sync::Arc;

use chrono::{DateTime, Utc};

use common::{Level1Field, LogMessage, Portfolio, Security, ValuesChanged};
use rx::{from_event, from_event0, from_event4, Event0, Event1, Event4, Observable};

use crate::hook;

// ─── Securities ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SecurityProviderEvents {
    pub added: Event1<Vec<Security>>,
    pub removed: Event1<Vec<Security>>,
    pub cleared: Event0,
}

pub trait SecurityProvider: Send + Sync + 'static {
    fn security_provider_events(&self) -> &SecurityProviderEvents;

    fn lookup_security(&self, security_id: &str) -> Option<Security>;
}

pub trait RxSecurityProvider {
    type Source: SecurityProvider + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    fn rx_added(&self) -> Observable<Vec<Security>> {
        from_event(hook(self.rx_source(), |p| &p.security_provider_events().added))
    }

    fn rx_removed(&self) -> Observable<Vec<Security>> {
        from_event(hook(self.rx_source(), |p| &p.security_provider_events().removed))
    }

    fn rx_cleared(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |p| &p.security_provider_events().cleared))
    }
}

impl<S: SecurityProvider + ?Sized> RxSecurityProvider for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}

// ─── Portfolios ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct PortfolioProviderEvents {
    pub new_portfolio: Event1<Portfolio>,
    pub portfolio_changed: Event1<Portfolio>,
}

pub trait PortfolioProvider: Send + Sync + 'static {
    fn portfolio_provider_events(&self) -> &PortfolioProviderEvents;

    fn lookup_portfolio(&self, name: &str) -> Option<Portfolio>;
}

pub trait RxPortfolioProvider {
    type Source: PortfolioProvider + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    fn rx_new_portfolio(&self) -> Observable<Portfolio> {
        from_event(hook(self.rx_source(), |p| &p.portfolio_provider_events().new_portfolio))
    }

    fn rx_portfolio_changed(&self) -> Observable<Portfolio> {
        from_event(hook(self.rx_source(), |p| {
            &p.portfolio_provider_events().portfolio_changed
        }))
    }
}

impl<S: PortfolioProvider + ?Sized> RxPortfolioProvider for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}

// ─── Level1 ──────────────────────────────────────────────────────────────────

pub type Level1Changes = Vec<(Level1Field, f64)>;

#[derive(Default)]
pub struct MarketDataProviderEvents {
    /// Security, changed fields, server time, local time.
    pub values_changed: Event4<Security, Level1Changes, DateTime<Utc>, DateTime<Utc>>,
}

pub trait MarketDataProvider: Send + Sync + 'static {
    fn market_data_events(&self) -> &MarketDataProviderEvents;
}

pub trait RxMarketDataProvider {
    type Source: MarketDataProvider + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    fn rx_values_changed(&self) -> Observable<ValuesChanged> {
        from_event4(
            hook(self.rx_source(), |p| &p.market_data_events().values_changed),
            |security, changes, server_time, local_time| ValuesChanged {
                security,
                changes,
                server_time,
                local_time,
            },
        )
    }
}

impl<S: MarketDataProvider + ?Sized> RxMarketDataProvider for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}

// ─── Logs ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSourceEvents {
    pub log: Event1<LogMessage>,
}

pub trait LogSource: Send + Sync + 'static {
    fn log_events(&self) -> &LogSourceEvents;
}

pub trait RxLogSource {
    type Source: LogSource + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    fn rx_log(&self) -> Observable<LogMessage> {
        from_event(hook(self.rx_source(), |s| &s.log_events().log))
    }
}

impl<S: LogSource + ?Sized> RxLogSource for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}
