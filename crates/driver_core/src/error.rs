//! Error types for the external collaborators and configuration loading.
//!
//! None of these are fatal: systems log them and degrade to stale or partial
//! state. The accept race is deliberately *not* an error; see
//! [`crate::dispatch::AcceptOutcome`].

use thiserror::Error;

/// Failures reported by the realtime ride store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("ride store unavailable: {0}")]
    Unavailable(String),
    #[error("ride {0} not found")]
    NotFound(String),
    #[error("ride store rejected the write: {0}")]
    Rejected(String),
}

/// Failures reported by a routing provider.
///
/// `Clone` so a failed result can travel inside a `RouteResolved` event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no route between the requested endpoints")]
    NoRoute,
    #[error("routing provider error: {0}")]
    Provider(String),
    #[error("failed to decode routing response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
