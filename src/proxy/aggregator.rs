//! Result aggregator: the single point of mutation for run results

use crate::proxy::models::{ProbeOutcome, ProxyRecord, ProxyScheme};
use crate::proxy::store::{ResultStore, SortColumn, SortDirective};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Reachable and unreachable records, in probe completion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSets {
    pub reachable: Vec<ProxyRecord>,
    pub unreachable: Vec<ProxyRecord>,
}

impl PartitionSets {
    pub fn reachable_addresses(&self) -> Vec<String> {
        self.reachable.iter().map(|r| r.address.clone()).collect()
    }

    pub fn unreachable_addresses(&self) -> Vec<String> {
        self.unreachable.iter().map(|r| r.address.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.reachable.len() + self.unreachable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counts over the store at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub pending: usize,
    pub reachable: usize,
    pub unreachable: usize,
}

impl Tally {
    pub fn checked(&self) -> usize {
        self.reachable + self.unreachable
    }
}

#[derive(Debug, Default)]
struct Shared {
    store: ResultStore,
    partitions: PartitionSets,
}

/// Shared handle over the result store and its partitions.
///
/// Every write goes through one mutex, so a record update and its partition
/// append are observed together or not at all.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    shared: Arc<Mutex<Shared>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: ResultStore) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                store,
                partitions: PartitionSets::default(),
            })),
        }
    }

    /// Apply one probe outcome by original index and file the record into its
    /// partition. Returns `false` if the index is unknown or the record was
    /// already settled in this run.
    pub async fn record(&self, index: usize, outcome: ProbeOutcome) -> bool {
        let mut shared = self.shared.lock().await;

        match shared.store.get(index) {
            Some(record) if record.status.is_terminal() => {
                warn!(index, address = %record.address, "record already settled in this run");
                return false;
            }
            Some(_) => {}
            None => {
                warn!(index, "probe outcome for unknown record");
                return false;
            }
        }

        let Some(record) = shared.store.apply(index, outcome).cloned() else {
            return false;
        };
        if outcome.status.is_reachable() {
            shared.partitions.reachable.push(record);
        } else {
            shared.partitions.unreachable.push(record);
        }
        true
    }

    /// Swap in a freshly loaded store, dropping the previous results
    pub(crate) async fn replace_store(&self, store: ResultStore) {
        let mut shared = self.shared.lock().await;
        shared.store = store;
        shared.partitions = PartitionSets::default();
    }

    /// Reset every record to pending and start fresh partitions.
    /// Returns `(index, address)` pairs in load order.
    pub(crate) async fn begin_run(&self, scheme: ProxyScheme) -> Vec<(usize, String)> {
        let mut shared = self.shared.lock().await;
        shared.store.reset_all(scheme);
        shared.partitions = PartitionSets::default();
        shared
            .store
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| (index, record.address.clone()))
            .collect()
    }

    /// Copy of both partitions
    pub async fn partitions(&self) -> PartitionSets {
        self.shared.lock().await.partitions.clone()
    }

    pub async fn tally(&self) -> Tally {
        let shared = self.shared.lock().await;
        let store = &shared.store;
        Tally {
            total: store.len(),
            pending: store.count_where(|r| !r.status.is_terminal()),
            reachable: store.count_where(|r| r.status.is_reachable()),
            unreachable: store.count_where(|r| r.status.is_terminal() && !r.status.is_reachable()),
        }
    }

    /// Read the store under the lock
    pub async fn read<R>(&self, f: impl FnOnce(&ResultStore) -> R) -> R {
        let shared = self.shared.lock().await;
        f(&shared.store)
    }

    /// Records in display order
    pub async fn rows(&self) -> Vec<ProxyRecord> {
        self.read(|store| store.rows().cloned().collect()).await
    }

    pub async fn sort_by(&self, column: SortColumn, ascending: bool) {
        self.shared.lock().await.store.sort_by(column, ascending);
    }

    pub async fn toggle_sort(&self, column: SortColumn) -> SortDirective {
        self.shared.lock().await.store.toggle_sort(column)
    }
}
