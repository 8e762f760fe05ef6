//! Paper trading platform: a simulated venue that publishes every platform
//! event, plus the candle builder, order book, providers and strategy that
//! sit on it, and a scripted market replay to drive them.

pub mod candles;
pub mod connector;
pub mod depth;
pub mod portfolios;
pub mod replay;
pub mod scenario;
pub mod securities;
pub mod strategy;

pub use candles::PaperCandleManager;
pub use connector::PaperConnector;
pub use depth::PaperMarketDepth;
pub use portfolios::{AccountChange, PortfolioBook};
pub use replay::{apply, Platform, Replay};
pub use scenario::{OrderKind, Scenario, Step};
pub use securities::SecurityStore;
pub use strategy::PaperStrategy;
