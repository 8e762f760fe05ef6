//! Event tables of the platform entities and their observable bindings.
//!
//! Each entity publishes a table of [`rx::Event`]s through a trait
//! (`Connector`, `Strategy`, ...). The matching `Rx*` extension trait is
//! implemented for `Arc<S>` and exposes one `rx_*` method per event, each
//! returning a cold [`rx::Observable`].

use std::sync::Arc;

use rx::{Event, Hook};

pub mod candles;
pub mod connector;
pub mod depth;
pub mod providers;
pub mod strategy;

pub use candles::{CandleSource, CandleSourceEvents, RxCandleSource};
pub use connector::{Connector, ConnectorEvents, RxConnector};
pub use depth::{MarketDepthEvents, MarketDepthSource, RxMarketDepth};
pub use providers::{
    Level1Changes, LogSource, LogSourceEvents, MarketDataProvider, MarketDataProviderEvents,
    PortfolioProvider, PortfolioProviderEvents, RxLogSource, RxMarketDataProvider,
    RxPortfolioProvider, RxSecurityProvider, SecurityProvider, SecurityProviderEvents,
};
pub use strategy::{RxStrategy, Strategy, StrategyEvents};

/// Hook onto one event of a shared entity.
pub(crate) fn hook<S, F>(source: &Arc<S>, select: fn(&S) -> &Event<F>) -> Hook<Arc<F>>
where
    S: ?Sized + Send + Sync + 'static,
    F: ?Sized + 'static,
{
    Hook::on(Arc::clone(source), select)
}
