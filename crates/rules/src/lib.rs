//! Market rules derived from the entity bindings.
//!
//! A rule is an ordinary [`rx::Observable`] built by filtering, merging or
//! folding one or more bound events. Threshold rules take a
//! [`common::Unit`]; relative units are resolved once, against the value
//! observed when the rule is created.

pub mod candles;
pub mod connector;
pub mod depth;
pub mod order;
pub mod portfolio;
pub mod security;

pub use candles::CandleRules;
pub use connector::ConnectorRules;
pub use depth::DepthRules;
pub use order::OrderRules;
pub use portfolio::{PortfolioRules, PositionRules};
pub use security::SecurityRules;
