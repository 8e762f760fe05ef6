use std::sync::Arc;

use common::{MarketDepth, Quote, Unit};
use rx::Observable;
use surface::{MarketDepthSource, RxMarketDepth};
use tracing::debug;

/// Rules over an order book. Each firing carries the book snapshot that
/// satisfied the rule.
///
/// Spread and best-price rules resolve relative units against the book at
/// creation (zero for a missing side) and are checked on every quote change.
pub trait DepthRules: RxMarketDepth {
    fn when_depth_changed(&self) -> Observable<MarketDepth> {
        let book = Arc::clone(self.rx_source());
        self.rx_depth_changed().map(move |_| book.depth())
    }

    fn when_spread_more(&self, price: Unit) -> Observable<MarketDepth> {
        let first = self.rx_source().depth().spread().unwrap_or(0.0);
        let level = price.level_above(first);
        debug!(first, level, "spread-more rule armed");
        self.when_quotes(move |depth| depth.spread().is_some_and(|spread| spread > level))
    }

    fn when_spread_less(&self, price: Unit) -> Observable<MarketDepth> {
        let first = self.rx_source().depth().spread().unwrap_or(0.0);
        let level = price.level_below(first);
        debug!(first, level, "spread-less rule armed");
        self.when_quotes(move |depth| depth.spread().is_some_and(|spread| spread < level))
    }

    fn when_best_bid_price_more(&self, price: Unit) -> Observable<MarketDepth> {
        let level = price.level_above(best_price(self.rx_source().depth().best_bid()));
        self.when_quotes(move |depth| depth.best_bid().is_some_and(|bid| bid.price > level))
    }

    fn when_best_bid_price_less(&self, price: Unit) -> Observable<MarketDepth> {
        let level = price.level_below(best_price(self.rx_source().depth().best_bid()));
        self.when_quotes(move |depth| depth.best_bid().is_some_and(|bid| bid.price < level))
    }

    fn when_best_ask_price_more(&self, price: Unit) -> Observable<MarketDepth> {
        let level = price.level_above(best_price(self.rx_source().depth().best_ask()));
        self.when_quotes(move |depth| depth.best_ask().is_some_and(|ask| ask.price > level))
    }

    fn when_best_ask_price_less(&self, price: Unit) -> Observable<MarketDepth> {
        let level = price.level_below(best_price(self.rx_source().depth().best_ask()));
        self.when_quotes(move |depth| depth.best_ask().is_some_and(|ask| ask.price < level))
    }

    /// Book snapshots taken on quote changes that satisfy `check`.
    fn when_quotes<P>(&self, check: P) -> Observable<MarketDepth>
    where
        P: Fn(&MarketDepth) -> bool + Send + Sync + 'static,
    {
        let book = Arc::clone(self.rx_source());
        self.rx_quotes_changed().filter_map(move |_| {
            let depth = book.depth();
            check(&depth).then_some(depth)
        })
    }
}

fn best_price(quote: Option<&Quote>) -> f64 {
    quote.map_or(0.0, |q| q.price)
}

impl<S: MarketDepthSource + ?Sized> DepthRules for Arc<S> {}
