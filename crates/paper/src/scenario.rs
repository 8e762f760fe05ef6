use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use common::{Error, OrderSide, Result, Security, SessionState};

/// A market replay script: reference data plus an ordered list of steps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_name")]
    pub name: String,
    /// Market clock at the first step.
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub securities: Vec<SecuritySpec>,
    #[serde(default)]
    pub portfolios: Vec<PortfolioSpec>,
    #[serde(default)]
    pub candles: Vec<SeriesSpec>,
    pub strategy: Option<StrategySpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_name() -> String {
    "scenario".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecuritySpec {
    pub code: String,
    pub board: String,
    pub price_step: Option<f64>,
}

impl SecuritySpec {
    pub fn to_security(&self) -> Security {
        let mut security = Security::new(&self.code, &self.board);
        if let Some(step) = self.price_step {
            security.price_step = step;
        }
        security
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortfolioSpec {
    pub name: String,
    /// Starting cash; the configured initial capital when absent.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesSpec {
    pub security: String,
    pub timeframe_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrategySpec {
    #[serde(default = "default_strategy_name")]
    pub name: String,
    pub portfolio: String,
    pub security: String,
}

fn default_strategy_name() -> String {
    "desk".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
    Stop,
}

/// One replay step. Orders go through the scenario's strategy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Connect,
    Disconnect,
    /// Move the market clock forward.
    Advance { secs: i64 },
    Trade {
        security: String,
        price: f64,
        volume: f64,
    },
    /// Replace an order book. Levels are `[price, volume]`.
    Depth {
        security: String,
        #[serde(default)]
        bids: Vec<(f64, f64)>,
        #[serde(default)]
        asks: Vec<(f64, f64)>,
    },
    Order {
        side: OrderSide,
        #[serde(default)]
        kind: OrderKind,
        price: Option<f64>,
        volume: f64,
    },
    CancelAll,
    News {
        headline: String,
        security: Option<String>,
    },
    Session {
        board: String,
        exchange: String,
        state: SessionState,
    },
    Outage { message: String },
    Restore,
    StopCandles {
        security: String,
        timeframe_secs: i64,
    },
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let scenario = Self::parse(&raw)?;
        info!(
            path = %path.display(),
            name = %scenario.name,
            steps = scenario.steps.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let scenario: Scenario =
            toml::from_str(raw).map_err(|e| Error::Scenario(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reject references the replay could never satisfy.
    fn validate(&self) -> Result<()> {
        let ids: Vec<String> = self
            .securities
            .iter()
            .map(|s| s.to_security().id)
            .collect();
        let known = |id: &str| ids.iter().any(|known| known == id);

        for series in &self.candles {
            if !known(&series.security) {
                return Err(Error::UnknownSecurity(series.security.clone()));
            }
            if series.timeframe_secs <= 0 {
                return Err(Error::Scenario(format!(
                    "candle time frame must be positive for {}",
                    series.security
                )));
            }
        }
        if let Some(strategy) = &self.strategy {
            if !known(&strategy.security) {
                return Err(Error::UnknownSecurity(strategy.security.clone()));
            }
            if !self.portfolios.iter().any(|p| p.name == strategy.portfolio) {
                return Err(Error::UnknownPortfolio(strategy.portfolio.clone()));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::Trade { security, .. }
                | Step::Depth { security, .. }
                | Step::StopCandles { security, .. }
                    if !known(security) =>
                {
                    return Err(Error::UnknownSecurity(security.clone()));
                }
                Step::Order { kind, price, .. } => {
                    if self.strategy.is_none() {
                        return Err(Error::Scenario(format!(
                            "step {index}: orders need a [strategy] section"
                        )));
                    }
                    if *kind != OrderKind::Market && price.is_none() {
                        return Err(Error::Scenario(format!(
                            "step {index}: {kind:?} order needs a price"
                        )));
                    }
                }
                Step::Advance { secs } if *secs < 0 => {
                    return Err(Error::Scenario(format!(
                        "step {index}: cannot advance by {secs}s"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
