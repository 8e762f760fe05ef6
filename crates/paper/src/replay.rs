use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{debug, info};

use common::{CandleSeries, Config, Error, ExchangeBoard, News, Portfolio, Result};
use surface::Connector;

use crate::candles::PaperCandleManager;
use crate::connector::PaperConnector;
use crate::scenario::{OrderKind, Scenario, Step};
use crate::strategy::PaperStrategy;

/// Everything a scenario runs against.
pub struct Platform {
    pub connector: Arc<PaperConnector>,
    pub candles: Arc<PaperCandleManager>,
    pub strategy: Option<Arc<PaperStrategy>>,
    pub series: Vec<CandleSeries>,
}

impl Platform {
    /// Create the venue and load the scenario's reference data. Nothing is
    /// connected yet.
    pub fn build(config: &Config, scenario: &Scenario) -> Self {
        let connector = PaperConnector::new(config.slippage_bps, scenario.start);
        for security in &scenario.securities {
            connector.add_security(security.to_security());
        }
        for portfolio in &scenario.portfolios {
            connector.add_portfolio(Portfolio::new(
                &portfolio.name,
                portfolio.value.unwrap_or(config.initial_capital),
            ));
        }

        let candles = PaperCandleManager::new(&connector);
        let series: Vec<CandleSeries> = scenario
            .candles
            .iter()
            .map(|spec| CandleSeries::new(&spec.security, spec.timeframe_secs))
            .collect();
        for s in &series {
            candles.start(s);
        }

        let strategy = scenario.strategy.as_ref().map(|spec| {
            PaperStrategy::new(
                &spec.name,
                &connector,
                Some(Arc::clone(&candles)),
                &spec.portfolio,
                &spec.security,
            )
        });

        info!(
            securities = scenario.securities.len(),
            portfolios = scenario.portfolios.len(),
            series = series.len(),
            slippage_bps = config.slippage_bps,
            "paper platform built"
        );
        Self {
            connector,
            candles,
            strategy,
            series,
        }
    }
}

/// Drives a platform through a scenario's steps.
pub struct Replay {
    steps: Vec<Step>,
    pace: StdDuration,
}

impl Replay {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            steps: scenario.steps.clone(),
            pace: StdDuration::ZERO,
        }
    }

    /// Wall-clock pause between steps.
    pub fn with_pace(mut self, pace: StdDuration) -> Self {
        self.pace = pace;
        self
    }

    /// Apply every step in order, yielding to other tasks in between.
    /// Returns the number of steps applied.
    pub async fn run(&self, platform: &Platform) -> Result<usize> {
        for (index, step) in self.steps.iter().enumerate() {
            debug!(index, ?step, "replay step");
            apply(platform, step)?;
            if self.pace.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.pace).await;
            }
        }
        info!(steps = self.steps.len(), "replay finished");
        Ok(self.steps.len())
    }
}

/// Apply one step to the platform.
pub fn apply(platform: &Platform, step: &Step) -> Result<()> {
    let connector = &platform.connector;
    match step {
        Step::Connect => {
            connector.connect();
            if let Some(strategy) = &platform.strategy {
                strategy.start();
            }
        }
        Step::Disconnect => {
            if let Some(strategy) = &platform.strategy {
                strategy.stop();
            }
            connector.disconnect();
        }
        Step::Advance { secs } => connector.advance_time(Duration::seconds(*secs)),
        Step::Trade {
            security,
            price,
            volume,
        } => {
            connector.push_trade(security, *price, *volume)?;
        }
        Step::Depth {
            security,
            bids,
            asks,
        } => {
            connector.update_depth(security, bids, asks)?;
        }
        Step::Order {
            side,
            kind,
            price,
            volume,
        } => {
            let Some(strategy) = &platform.strategy else {
                return Err(Error::Scenario("order step without a strategy".into()));
            };
            let price = price.unwrap_or(0.0);
            let order = match kind {
                OrderKind::Market => strategy.market(*side, *volume),
                OrderKind::Limit => strategy.limit(*side, price, *volume),
                OrderKind::Stop => strategy.conditional(*side, price, *volume),
            };
            strategy.register_order(order)?;
        }
        Step::CancelAll => {
            connector.cancel_orders();
        }
        Step::News { headline, security } => {
            let mut news = News::new(headline, connector.current_time());
            news.security_id = security.clone();
            connector.publish_news(news);
        }
        Step::Session {
            board,
            exchange,
            state,
        } => connector.set_session(
            ExchangeBoard {
                code: board.clone(),
                exchange: exchange.clone(),
            },
            *state,
        ),
        Step::Outage { message } => connector.fail_connection(message),
        Step::Restore => connector.restore(),
        Step::StopCandles {
            security,
            timeframe_secs,
        } => platform
            .candles
            .stop(&CandleSeries::new(security, *timeframe_secs)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx::Collector;
    use surface::{RxConnector, RxStrategy};

    const SCRIPT: &str = r#"
        start = "2024-03-01T09:00:00Z"

        [[securities]]
        code = "A"
        board = "X"

        [[portfolios]]
        name = "main"
        value = 10000.0

        [strategy]
        portfolio = "main"
        security = "A@X"

        [[candles]]
        security = "A@X"
        timeframe_secs = 60

        [[steps]]
        action = "connect"

        [[steps]]
        action = "trade"
        security = "A@X"
        price = 100.0
        volume = 1.0

        [[steps]]
        action = "order"
        side = "BUY"
        volume = 2.0

        [[steps]]
        action = "order"
        side = "SELL"
        kind = "limit"
        price = 105.0
        volume = 2.0

        [[steps]]
        action = "advance"
        secs = 30

        [[steps]]
        action = "trade"
        security = "A@X"
        price = 106.0
        volume = 1.0

        [[steps]]
        action = "disconnect"
    "#;

    #[tokio::test]
    async fn replay_runs_orders_through_the_strategy() {
        let scenario = Scenario::parse(SCRIPT).unwrap();
        let platform = Platform::build(&Config::default(), &scenario);
        let strategy = platform.strategy.clone().unwrap();

        let fills = Collector::new();
        let _sub = strategy.rx_new_my_trade().subscribe(fills.clone());

        let applied = Replay::new(&scenario).run(&platform).await.unwrap();

        assert_eq!(applied, 7);
        let prices: Vec<f64> = fills.values().iter().map(|t| t.trade.price).collect();
        assert_eq!(prices, vec![100.0, 105.0]);
        assert_eq!(strategy.position(), 0.0);
        assert!(!platform.connector.is_connected());
    }

    #[tokio::test]
    async fn portfolio_value_falls_back_to_initial_capital() {
        let raw = r#"
            start = "2024-03-01T09:00:00Z"
            [[portfolios]]
            name = "main"
        "#;
        let scenario = Scenario::parse(raw).unwrap();
        let config = Config {
            initial_capital: 42.0,
            ..Config::default()
        };
        let platform = Platform::build(&config, &scenario);

        let portfolios = platform.connector.portfolios().portfolios();
        assert_eq!(portfolios[0].current_value, 42.0);
    }

    #[tokio::test]
    async fn candles_are_built_during_replay() {
        let scenario = Scenario::parse(SCRIPT).unwrap();
        let platform = Platform::build(&Config::default(), &scenario);
        let seen = Collector::new();
        let _sub = platform
            .connector
            .rx_candle_series_processing()
            .subscribe(seen.clone());

        Replay::new(&scenario).run(&platform).await.unwrap();

        assert_eq!(seen.len(), 2);
    }
}
