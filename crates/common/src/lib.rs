pub mod config;
pub mod error;
pub mod notify;
pub mod types;
pub mod unit;

pub use config::Config;
pub use error::{Error, Result};
pub use notify::*;
pub use types::*;
pub use unit::Unit;
