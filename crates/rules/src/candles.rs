use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Candle, CandleSeries, CandleState, Error, Result, SeriesCandle, Unit};
use rx::Observable;
use surface::{CandleSource, Connector, RxCandleSource, RxConnector};
use tracing::debug;

/// Rules over the candles a candle source builds.
pub trait CandleRules: RxCandleSource {
    /// Updates of `candle` whose close drops below `price`, resolved
    /// against the candle's close at creation.
    fn when_close_price_less(&self, candle: &Candle, price: Unit) -> Observable<Candle> {
        let level = price.level_below(candle.close_price);
        self.when_changed(candle)
            .filter(move |c: &Candle| c.close_price < level)
    }

    fn when_close_price_more(&self, candle: &Candle, price: Unit) -> Observable<Candle> {
        let level = price.level_above(candle.close_price);
        self.when_changed(candle)
            .filter(move |c: &Candle| c.close_price > level)
    }

    fn when_total_volume_more(&self, candle: &Candle, volume: Unit) -> Observable<Candle> {
        let level = volume.level_above(candle.total_volume);
        self.when_changed(candle)
            .filter(move |c: &Candle| c.total_volume > level)
    }

    /// Candles of `series` whose volume exceeds `volume`. A relative unit
    /// is resolved against the current candle, so one must exist.
    fn when_current_candle_total_volume_more(
        &self,
        series: &CandleSeries,
        volume: Unit,
    ) -> Result<Observable<Candle>> {
        let level = if volume.is_limit() {
            volume.level_above(0.0)
        } else {
            let current = self
                .rx_source()
                .current_candle(series)
                .ok_or_else(|| Error::NoCurrentCandle(series.clone()))?;
            volume.level_above(current.total_volume)
        };
        debug!(%series, level, "current-candle volume rule armed");
        Ok(self
            .when_candles_changed(series)
            .filter(move |c: &Candle| c.total_volume > level))
    }

    /// The first update of every new candle of `series`.
    fn when_candles_started(&self, series: &CandleSeries) -> Observable<Candle> {
        self.when_candles_changed(series)
            .distinct_until_changed_by(|c: &Candle| c.open_time)
    }

    fn when_candles_changed(&self, series: &CandleSeries) -> Observable<Candle> {
        let series = series.clone();
        self.rx_processing()
            .filter(move |update: &SeriesCandle| update.series == series)
            .map(|update: SeriesCandle| update.candle)
    }

    fn when_candles(&self, series: &CandleSeries) -> Observable<Candle> {
        self.when_candles_changed(series)
    }

    fn when_candles_finished(&self, series: &CandleSeries) -> Observable<Candle> {
        self.when_candles(series)
            .filter(|c: &Candle| c.state == CandleState::Finished)
    }

    /// Updates of one candle, matched by security and open time.
    fn when_changed(&self, candle: &Candle) -> Observable<Candle> {
        let candle = candle.clone();
        self.rx_processing()
            .map(|update: SeriesCandle| update.candle)
            .filter(move |c: &Candle| c.same_as(&candle))
    }

    fn when_finished(&self, candle: &Candle) -> Observable<Candle> {
        self.when_changed(candle)
            .filter(|c: &Candle| c.state == CandleState::Finished)
    }

    /// `candle`, once, when market time passes `percent` of its timeframe.
    fn when_partially_finished<C>(&self, candle: &Candle, connector: &Arc<C>, percent: f64) -> Observable<Candle>
    where
        C: Connector + ?Sized,
    {
        let candle = candle.clone();
        let clock = Arc::clone(connector);
        let fraction = fraction(percent);
        connector
            .rx_market_time_changed()
            .filter_map(move |_| {
                elapsed_past(&candle, clock.current_time(), fraction).then(|| candle.clone())
            })
            .take(1)
    }

    /// Every candle of `series`, once, when market time passes `percent` of
    /// its timeframe.
    fn when_partially_finished_candles<C>(
        &self,
        series: &CandleSeries,
        connector: &Arc<C>,
        percent: f64,
    ) -> Observable<Candle>
    where
        C: Connector + ?Sized,
    {
        let series = series.clone();
        let source = Arc::clone(self.rx_source());
        let clock = Arc::clone(connector);
        let fraction = fraction(percent);
        connector
            .rx_market_time_changed()
            .filter_map(move |_| {
                source
                    .current_candle(&series)
                    .filter(|c| elapsed_past(c, clock.current_time(), fraction))
            })
            .distinct_until_changed_by(|c: &Candle| c.open_time)
    }
}

fn fraction(percent: f64) -> f64 {
    percent.clamp(0.0, 100.0) / 100.0
}

fn elapsed_past(candle: &Candle, now: DateTime<Utc>, fraction: f64) -> bool {
    let span = (candle.close_time - candle.open_time).num_milliseconds() as f64;
    let elapsed = (now - candle.open_time).num_milliseconds() as f64;
    elapsed >= span * fraction
}

impl<S: CandleSource + ?Sized> CandleRules for Arc<S> {}
