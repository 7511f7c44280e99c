//! Proxy validation engine
//!
//! This module provides functionality for:
//! - Loading proxy address lists and exporting good/bad lists
//! - Probing a proxy through a fixed endpoint with a timeout
//! - Running probes over a whole list with bounded concurrency and cooperative stop
//! - Keeping results in a store that can be sorted by any column

pub mod aggregator;
pub mod checker;
pub mod config;
pub mod controller;
pub mod gate;
pub mod loader;
pub mod models;
pub mod store;

pub use aggregator::{PartitionSets, ResultAggregator, Tally};
pub use checker::{HttpProbe, Probe};
pub use config::RunConfig;
pub use controller::{RunController, RunHandle, RunReport, RunState};
pub use gate::{Admission, ConcurrencyGate};
pub use loader::{load_addresses, parse_addresses, save_addresses};
pub use models::{ProbeOutcome, ProbeStatus, ProxyRecord, ProxyScheme};
pub use store::{ResultStore, SortColumn, SortDirective};
