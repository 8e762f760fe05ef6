use std::sync::Arc;

use common::{MarketDepth, Quote};
use rx::{from_event, from_event0, Event0, Event1, Observable};

use crate::hook;

#[derive(Default)]
pub struct MarketDepthEvents {
    pub depth_changed: Event0,
    pub quotes_changed: Event0,
    /// A quote fell outside the tracked depth.
    pub quote_out_of_depth: Event1<Quote>,
}

/// A live order book for one security.
pub trait MarketDepthSource: Send + Sync + 'static {
    fn depth_events(&self) -> &MarketDepthEvents;

    /// Current book snapshot.
    fn depth(&self) -> MarketDepth;
}

pub trait RxMarketDepth {
    type Source: MarketDepthSource + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    fn rx_depth_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |d| &d.depth_events().depth_changed))
    }

    fn rx_quotes_changed(&self) -> Observable<()> {
        from_event0(hook(self.rx_source(), |d| &d.depth_events().quotes_changed))
    }

    fn rx_quote_out_of_depth(&self) -> Observable<Quote> {
        from_event(hook(self.rx_source(), |d| &d.depth_events().quote_out_of_depth))
    }
}

impl<S: MarketDepthSource + ?Sized> RxMarketDepth for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}
