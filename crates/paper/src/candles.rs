use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use common::{Candle, CandleSeries, CandleState, Trade};
use rx::CompositeSubscription;
use surface::{CandleSource, CandleSourceEvents, Connector, RxConnector};

use crate::connector::PaperConnector;

/// Builds time-frame candles from the connector's tape.
///
/// A candle starts with the first trade inside its time frame and finishes
/// when a later trade opens the next one or the market clock passes its
/// close time.
pub struct PaperCandleManager {
    core: Arc<CandleCore>,
    links: CompositeSubscription,
}

struct CandleCore {
    events: CandleSourceEvents,
    connector: Arc<PaperConnector>,
    series: Mutex<HashMap<CandleSeries, Option<Candle>>>,
}

impl PaperCandleManager {
    pub fn new(connector: &Arc<PaperConnector>) -> Arc<Self> {
        let core = Arc::new(CandleCore {
            events: CandleSourceEvents::default(),
            connector: Arc::clone(connector),
            series: Mutex::new(HashMap::new()),
        });
        let links = CompositeSubscription::new();

        let on_trade = Arc::clone(&core);
        links.add(
            connector
                .rx_new_trade()
                .subscribe_fn(move |trade| on_trade.apply_trade(&trade)),
        );
        let on_clock = Arc::clone(&core);
        links.add(
            connector
                .rx_market_time_changed()
                .subscribe_fn(move |_| on_clock.close_elapsed()),
        );

        Arc::new(Self { core, links })
    }

    /// Start building candles for `series`. Starting twice is a no-op.
    pub fn start(&self, series: &CandleSeries) {
        self.core
            .series
            .lock()
            .entry(series.clone())
            .or_insert(None);
        info!(series = %series, "candle series started");
    }

    /// Stop `series`: its open candle is finished first, then the stop is
    /// announced.
    pub fn stop(&self, series: &CandleSeries) {
        let open = match self.core.series.lock().remove(series) {
            Some(open) => open,
            None => return,
        };
        if let Some(mut candle) = open.filter(|c| c.state != CandleState::Finished) {
            candle.state = CandleState::Finished;
            self.core.publish(series, &candle);
        }
        info!(series = %series, "candle series stopped");
        self.core.events.stopped.raise(series.clone());
        self.core.connector.publish_series_stopped(series);
    }

    pub fn series(&self) -> Vec<CandleSeries> {
        self.core.series.lock().keys().cloned().collect()
    }

    /// Report a build failure to subscribers.
    pub fn report_error(&self, message: &str) {
        self.core
            .events
            .error
            .raise(common::PlatformError::new(message));
    }

    pub fn is_linked(&self) -> bool {
        !self.links.is_disposed()
    }
}

impl Drop for PaperCandleManager {
    fn drop(&mut self) {
        self.links.dispose();
    }
}

impl CandleCore {
    fn apply_trade(&self, trade: &Trade) {
        let updates: Vec<(CandleSeries, Candle)> = {
            let mut series = self.series.lock();
            let mut updates = Vec::new();
            for (key, current) in series.iter_mut() {
                if key.security_id != trade.security_id {
                    continue;
                }
                let open_time = key.open_time_for(trade.time);
                match current.take() {
                    Some(mut candle) if candle.open_time == open_time && candle.state != CandleState::Finished => {
                        candle.high_price = candle.high_price.max(trade.price);
                        candle.low_price = candle.low_price.min(trade.price);
                        candle.close_price = trade.price;
                        candle.total_volume += trade.volume;
                        candle.state = CandleState::Changed;
                        updates.push((key.clone(), candle.clone()));
                        *current = Some(candle);
                    }
                    previous => {
                        if let Some(mut done) = previous.filter(|c| c.state != CandleState::Finished) {
                            done.state = CandleState::Finished;
                            updates.push((key.clone(), done));
                        }
                        let fresh = Candle::open(key, trade.price, trade.volume, trade.time);
                        updates.push((key.clone(), fresh.clone()));
                        *current = Some(fresh);
                    }
                }
            }
            updates
        };
        for (series, candle) in &updates {
            self.publish(series, candle);
        }
    }

    fn close_elapsed(&self) {
        let now = self.connector.current_time();
        let finished: Vec<(CandleSeries, Candle)> = {
            let mut series = self.series.lock();
            series
                .iter_mut()
                .filter_map(|(key, current)| {
                    let candle = current.as_mut()?;
                    if candle.state == CandleState::Finished || candle.close_time > now {
                        return None;
                    }
                    candle.state = CandleState::Finished;
                    Some((key.clone(), candle.clone()))
                })
                .collect()
        };
        for (series, candle) in &finished {
            self.publish(series, candle);
        }
    }

    fn publish(&self, series: &CandleSeries, candle: &Candle) {
        debug!(
            series = %series,
            open_time = %candle.open_time,
            close = candle.close_price,
            volume = candle.total_volume,
            state = ?candle.state,
            "candle"
        );
        self.events.processing.raise(series.clone(), candle.clone());
        self.connector.publish_candle(series, candle);
    }
}

impl CandleSource for PaperCandleManager {
    fn candle_events(&self) -> &CandleSourceEvents {
        &self.core.events
    }

    fn current_candle(&self, series: &CandleSeries) -> Option<Candle> {
        self.core.series.lock().get(series).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::Security;
    use rx::Collector;
    use surface::RxCandleSource;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (Arc<PaperConnector>, Arc<PaperCandleManager>, CandleSeries) {
        let venue = PaperConnector::new(0.0, t0());
        venue.add_security(Security::new("A", "X"));
        let manager = PaperCandleManager::new(&venue);
        let series = CandleSeries::new("A@X", 60);
        manager.start(&series);
        (venue, manager, series)
    }

    #[test]
    fn trades_build_one_candle_per_time_frame() {
        let (venue, manager, series) = setup();
        let seen = Collector::new();
        let _sub = manager.rx_processing().subscribe(seen.clone());

        venue.push_trade("A@X", 10.0, 1.0).unwrap();
        venue.push_trade("A@X", 12.0, 2.0).unwrap();
        venue.advance_time(Duration::seconds(61));
        venue.push_trade("A@X", 11.0, 1.0).unwrap();

        let states: Vec<CandleState> = seen.values().iter().map(|u| u.candle.state).collect();
        assert_eq!(
            states,
            vec![
                CandleState::Started,
                CandleState::Changed,
                CandleState::Finished,
                CandleState::Started
            ]
        );
        let finished = &seen.values()[2].candle;
        assert_eq!(finished.high_price, 12.0);
        assert_eq!(finished.total_volume, 3.0);
        assert_eq!(manager.current_candle(&series).map(|c| c.open_price), Some(11.0));
    }

    #[test]
    fn unregistered_securities_are_ignored() {
        let (venue, manager, _) = setup();
        venue.add_security(Security::new("B", "X"));
        let seen = Collector::new();
        let _sub = manager.rx_processing().subscribe(seen.clone());

        venue.push_trade("B@X", 10.0, 1.0).unwrap();

        assert!(seen.is_empty());
    }

    #[test]
    fn stop_finishes_the_open_candle_then_completes() {
        let (venue, manager, series) = setup();
        let seen = Collector::new();
        let _sub = manager.rx_processing().subscribe(seen.clone());

        venue.push_trade("A@X", 10.0, 1.0).unwrap();
        manager.stop(&series);

        let values = seen.values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].candle.state, CandleState::Finished);
        assert!(seen.is_completed());
        assert!(manager.series().is_empty());
    }

    #[test]
    fn connector_carries_the_same_candles() {
        let (venue, manager, _) = setup();
        let seen = Collector::new();
        let _sub = venue.rx_candle_series_processing().subscribe(seen.clone());

        venue.push_trade("A@X", 10.0, 1.0).unwrap();

        assert_eq!(seen.len(), 1);
        assert!(manager.is_linked());
    }
}
