//! Error types for configuration and run control

use thiserror::Error;

/// Rejected run configuration. Raised before any probing starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "invalid thread count: {0} (must be between 1 and {max})",
        max = crate::proxy::config::MAX_CONCURRENT_LIMIT
    )]
    InvalidConcurrency(usize),

    #[error("invalid timeout value (must be greater than zero)")]
    InvalidTimeout,

    #[error("invalid {field} value: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unsupported proxy scheme: {0}. Use: http, socks4, socks5")]
    UnsupportedScheme(String),

    #[error("invalid probe URL {url:?}: {reason}")]
    InvalidProbeUrl { url: String, reason: String },
}

/// Errors surfaced by the run controller.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a validation run is already in progress")]
    AlreadyRunning,

    #[error("validation run aborted: {0}")]
    Aborted(String),
}
