use thiserror::Error;

use crate::CandleSeries;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error("Unknown security: {0}")]
    UnknownSecurity(String),

    #[error("Unknown portfolio: {0}")]
    UnknownPortfolio(String),

    #[error("Unknown order: #{0}")]
    UnknownOrder(u64),

    #[error("No current candle for series {0}")]
    NoCurrentCandle(CandleSeries),

    #[error(transparent)]
    Rx(#[from] rx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
