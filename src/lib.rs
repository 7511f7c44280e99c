//! Proxy Vet - bounded-concurrency proxy list validator
//!
//! Loads a list of proxy addresses, probes each one through a fixed endpoint
//! with a bounded number of concurrent workers, and partitions the results
//! into reachable and unreachable sets with a sortable result table.

pub mod error;
pub mod logging;
pub mod proxy;
pub mod tui;

pub use error::{ConfigError, RunError};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
