use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use common::{MarketDepth, Quote};
use surface::{MarketDepthEvents, MarketDepthSource};

/// Order book of one security.
pub struct PaperMarketDepth {
    events: MarketDepthEvents,
    depth: Mutex<MarketDepth>,
}

impl PaperMarketDepth {
    pub fn new(security_id: &str) -> Self {
        Self {
            events: MarketDepthEvents::default(),
            depth: Mutex::new(MarketDepth::empty(security_id)),
        }
    }

    /// Replace both sides of the book. Quotes whose price level disappears
    /// are reported through `quote_out_of_depth`.
    pub fn update(&self, mut bids: Vec<Quote>, mut asks: Vec<Quote>, time: DateTime<Utc>) -> MarketDepth {
        bids.sort_by(|a, b| b.price.total_cmp(&a.price));
        asks.sort_by(|a, b| a.price.total_cmp(&b.price));

        let (gone, snapshot) = {
            let mut depth = self.depth.lock();
            let mut gone: Vec<Quote> = dropped(&depth.bids, &bids);
            gone.extend(dropped(&depth.asks, &asks));
            depth.bids = bids;
            depth.asks = asks;
            depth.time = time;
            (gone, depth.clone())
        };

        for quote in gone {
            self.events.quote_out_of_depth.raise(quote);
        }
        self.events.quotes_changed.raise();
        self.events.depth_changed.raise();
        snapshot
    }
}

fn dropped(before: &[Quote], after: &[Quote]) -> Vec<Quote> {
    before
        .iter()
        .filter(|old| !after.iter().any(|new| new.price == old.price))
        .cloned()
        .collect()
}

impl MarketDepthSource for PaperMarketDepth {
    fn depth_events(&self) -> &MarketDepthEvents {
        &self.events
    }

    fn depth(&self) -> MarketDepth {
        self.depth.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderSide;
    use rx::Collector;
    use std::sync::Arc;
    use surface::RxMarketDepth;

    fn quote(side: OrderSide, price: f64) -> Quote {
        Quote {
            security_id: "A@X".into(),
            side,
            price,
            volume: 1.0,
        }
    }

    #[test]
    fn update_sorts_sides_best_first() {
        let book = PaperMarketDepth::new("A@X");
        let depth = book.update(
            vec![quote(OrderSide::Buy, 98.0), quote(OrderSide::Buy, 99.0)],
            vec![quote(OrderSide::Sell, 101.0), quote(OrderSide::Sell, 100.0)],
            Utc::now(),
        );
        assert_eq!(depth.best_bid().map(|q| q.price), Some(99.0));
        assert_eq!(depth.best_ask().map(|q| q.price), Some(100.0));
    }

    #[test]
    fn vanished_levels_go_out_of_depth() {
        let book = Arc::new(PaperMarketDepth::new("A@X"));
        book.update(
            vec![quote(OrderSide::Buy, 99.0), quote(OrderSide::Buy, 98.0)],
            vec![quote(OrderSide::Sell, 100.0)],
            Utc::now(),
        );

        let gone = Collector::new();
        let changes = Collector::new();
        let _a = book.rx_quote_out_of_depth().subscribe(gone.clone());
        let _b = book.rx_quotes_changed().subscribe(changes.clone());

        book.update(
            vec![quote(OrderSide::Buy, 99.0)],
            vec![quote(OrderSide::Sell, 100.0)],
            Utc::now(),
        );

        assert_eq!(gone.values(), vec![quote(OrderSide::Buy, 98.0)]);
        assert_eq!(changes.len(), 1);
    }
}
