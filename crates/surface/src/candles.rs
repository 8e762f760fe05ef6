use std::sync::Arc;

use common::{Candle, CandleSeries, PlatformError, SeriesCandle};
use rx::{from_event, from_event2, Event1, Event2, Observable};

use crate::hook;

#[derive(Default)]
pub struct CandleSourceEvents {
    pub processing: Event2<CandleSeries, Candle>,
    pub stopped: Event1<CandleSeries>,
    pub error: Event1<PlatformError>,
}

/// Builds candles for registered series and publishes their updates.
pub trait CandleSource: Send + Sync + 'static {
    fn candle_events(&self) -> &CandleSourceEvents;

    /// The candle currently being built for `series`.
    fn current_candle(&self, series: &CandleSeries) -> Option<Candle>;
}

pub trait RxCandleSource {
    type Source: CandleSource + ?Sized;

    fn rx_source(&self) -> &Arc<Self::Source>;

    /// Candle updates. Completes when a series stops and faults when the
    /// source reports an error.
    fn rx_processing(&self) -> Observable<SeriesCandle> {
        from_event2(
            hook(self.rx_source(), |s| &s.candle_events().processing),
            |series, candle| SeriesCandle { series, candle },
        )
        .complete_on(hook(self.rx_source(), |s| &s.candle_events().stopped))
        .error_on(hook(self.rx_source(), |s| &s.candle_events().error))
    }

    fn rx_stopped(&self) -> Observable<CandleSeries> {
        from_event(hook(self.rx_source(), |s| &s.candle_events().stopped))
    }

    fn rx_error(&self) -> Observable<PlatformError> {
        from_event(hook(self.rx_source(), |s| &s.candle_events().error))
    }
}

impl<S: CandleSource + ?Sized> RxCandleSource for Arc<S> {
    type Source = S;

    fn rx_source(&self) -> &Arc<S> {
        self
    }
}
