use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{CandleSeries, MyTrade, Order, SeriesCandle};
use rx::Observable;
use surface::{Connector, RxConnector};
use tracing::debug;

pub trait ConnectorRules: RxConnector {
    /// Updates of one candle series. Completes when the connector stops a
    /// series.
    fn when_candles(&self, series: &CandleSeries) -> Observable<SeriesCandle> {
        let series = series.clone();
        self.rx_candle_series_processing()
            .filter(move |update: &SeriesCandle| update.series == series)
    }

    fn when_new_my_trade(&self) -> Observable<MyTrade> {
        self.rx_new_my_trade()
    }

    fn when_new_order(&self) -> Observable<Order> {
        self.rx_new_order()
    }

    /// Market time, each time another `interval` of it has elapsed since
    /// the previous firing. A non-positive interval fires on every change.
    fn when_interval_elapsed(&self, interval: Duration) -> Observable<DateTime<Utc>> {
        let connector = Arc::clone(self.rx_source());
        let zero = Duration::zero();
        debug!(interval_ms = interval.num_milliseconds(), "interval rule armed");

        self.rx_market_time_changed()
            .scan((zero, false), move |&(elapsed, _), step: Duration| {
                let elapsed = elapsed + step;
                if elapsed < interval {
                    (elapsed, false)
                } else if interval > zero {
                    (elapsed - interval, true)
                } else {
                    (zero, true)
                }
            })
            .filter(|&(_, due)| due)
            .map(move |_| connector.current_time())
    }

    /// Each of `times`, once, as soon as market time reaches it. Completes
    /// after the last one; an empty list completes immediately.
    fn when_time_come<I>(&self, times: I) -> Observable<DateTime<Utc>>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        let mut times: Vec<DateTime<Utc>> = times.into_iter().collect();
        times.sort();
        times.dedup();
        let count = times.len();
        let times: Arc<[DateTime<Utc>]> = times.into();
        debug!(count, "time rule armed");

        let connector = Arc::clone(self.rx_source());
        let pending = Arc::clone(&times);
        self.rx_market_time_changed()
            .map(move |_| connector.current_time())
            // (start, end) of the slice that came due on this change
            .scan((0usize, 0usize), move |&(_, next), now: DateTime<Utc>| {
                let due = pending[next..].iter().take_while(|t| **t <= now).count();
                (next, next + due)
            })
            .flat_map_iter(move |(start, end)| times[start..end].to_vec())
            .take(count)
    }
}

impl<S: Connector + ?Sized> ConnectorRules for Arc<S> {}
