use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

const DEFAULT_SCENARIO: &str = "scenarios/demo.toml";
const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;

/// Runtime configuration, loaded from environment variables at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Scenario file replayed against the paper platform.
    pub scenario_path: PathBuf,
    /// Slippage in basis points applied to paper market fills.
    pub slippage_bps: f64,
    /// Starting value of the paper portfolio.
    pub initial_capital: f64,
    /// Wall-clock pause between replay steps, in milliseconds.
    pub pace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scenario_path: PathBuf::from(DEFAULT_SCENARIO),
            slippage_bps: 0.0,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            pace_ms: 0,
        }
    }
}

impl Config {
    /// Load configuration from the environment. Loads `.env` if present.
    /// Every variable is optional; a value that does not parse is an error.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(optional_env)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();
        let config = Config {
            scenario_path: lookup("RXREPLAY_SCENARIO")
                .map(PathBuf::from)
                .unwrap_or(defaults.scenario_path),
            slippage_bps: parse_var(&lookup, "RXREPLAY_SLIPPAGE_BPS")?
                .unwrap_or(defaults.slippage_bps),
            initial_capital: parse_var(&lookup, "RXREPLAY_INITIAL_CAPITAL")?
                .unwrap_or(defaults.initial_capital),
            pace_ms: match lookup("RXREPLAY_PACE_MS") {
                None => defaults.pace_ms,
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    Error::Config(format!("RXREPLAY_PACE_MS must be a whole number, got: '{raw}'"))
                })?,
            },
        };
        if config.slippage_bps < 0.0 {
            return Err(Error::Config(format!(
                "RXREPLAY_SLIPPAGE_BPS must not be negative, got {}",
                config.slippage_bps
            )));
        }
        debug!(?config, "configuration loaded");
        Ok(config)
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<f64>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} must be a number, got: '{raw}'"))),
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
