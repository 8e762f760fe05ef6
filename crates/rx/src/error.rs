use thiserror::Error;

/// Errors surfaced by the bridge, either synchronously to the caller that
/// builds a sequence or through an observer's error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required event source was absent when the sequence was built.
    #[error("event source '{name}' is not available")]
    MissingSource { name: &'static str },

    /// A raw callback panicked while building its notification.
    #[error("event producer failed: {0}")]
    Producer(String),

    /// The source raised an event it defines as terminal for the sequence.
    #[error("event source failed: {0}")]
    Source(String),

    /// An operator rejected an upstream value.
    #[error("{0}")]
    Upstream(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
