//! Sortable result store

use crate::proxy::models::{ProbeOutcome, ProxyRecord, ProxyScheme};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Column of the result table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortColumn {
    Scheme,
    Address,
    Latency,
    Status,
}

impl SortColumn {
    pub const ALL: [SortColumn; 4] = [
        SortColumn::Scheme,
        SortColumn::Address,
        SortColumn::Latency,
        SortColumn::Status,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SortColumn::Scheme => "Proxy Type",
            SortColumn::Address => "Address",
            SortColumn::Latency => "Latency",
            SortColumn::Status => "Status",
        }
    }

    /// Ascending comparator for this column
    pub fn compare(&self, a: &ProxyRecord, b: &ProxyRecord) -> Ordering {
        match self {
            SortColumn::Scheme => a.scheme.label().cmp(b.scheme.label()),
            SortColumn::Address => a.address.cmp(&b.address),
            SortColumn::Latency => a.latency.cmp(&b.latency),
            SortColumn::Status => a.status.label().cmp(b.status.label()),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheme" | "type" => Ok(SortColumn::Scheme),
            "address" => Ok(SortColumn::Address),
            "latency" => Ok(SortColumn::Latency),
            "status" => Ok(SortColumn::Status),
            _ => Err(format!(
                "Invalid sort column: {}. Use: scheme, address, latency, status",
                s
            )),
        }
    }
}

/// Current presentation ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDirective {
    pub column: SortColumn,
    pub ascending: bool,
}

impl Default for SortDirective {
    fn default() -> Self {
        Self {
            column: SortColumn::Address,
            ascending: true,
        }
    }
}

/// Records in load order plus a display permutation over them.
///
/// Sorting only permutes `order`; `records` keeps load order so a run can
/// write results by original index while the table is being re-sorted.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    records: Vec<ProxyRecord>,
    order: Vec<usize>,
    directive: SortDirective,
}

impl ResultStore {
    /// Build a store of pending records, one per address, in the given order
    pub fn load<I, S>(addresses: I, scheme: ProxyScheme) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records: Vec<ProxyRecord> = addresses
            .into_iter()
            .map(|address| ProxyRecord::new(address.into(), scheme))
            .collect();
        let order = (0..records.len()).collect();

        Self {
            records,
            order,
            directive: SortDirective::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn directive(&self) -> SortDirective {
        self.directive
    }

    /// Record by original (load) index
    pub fn get(&self, index: usize) -> Option<&ProxyRecord> {
        self.records.get(index)
    }

    /// Records in display order
    pub fn rows(&self) -> impl Iterator<Item = &ProxyRecord> + '_ {
        self.order.iter().map(move |&index| &self.records[index])
    }

    /// Records in load order
    pub fn records(&self) -> &[ProxyRecord] {
        &self.records
    }

    /// Reorder the visible rows by `column`.
    ///
    /// The sort is stable against the current display order, so repeating a
    /// call leaves the rows unchanged.
    pub fn sort_by(&mut self, column: SortColumn, ascending: bool) {
        let records = &self.records;
        self.order.sort_by(|&a, &b| {
            let ord = column.compare(&records[a], &records[b]);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        self.directive = SortDirective { column, ascending };
    }

    /// Header click: the same column flips direction, a new column sorts ascending
    pub fn toggle_sort(&mut self, column: SortColumn) -> SortDirective {
        let ascending = if self.directive.column == column {
            !self.directive.ascending
        } else {
            true
        };
        self.sort_by(column, ascending);
        self.directive
    }

    pub(crate) fn reset_all(&mut self, scheme: ProxyScheme) {
        for record in &mut self.records {
            record.reset(scheme);
        }
    }

    /// Write a probe outcome by original index
    pub(crate) fn apply(&mut self, index: usize, outcome: ProbeOutcome) -> Option<&ProxyRecord> {
        let record = self.records.get_mut(index)?;
        record.status = outcome.status;
        record.latency = outcome.elapsed;
        Some(record)
    }

    pub fn count_where(&self, pred: impl Fn(&ProxyRecord) -> bool) -> usize {
        self.records.iter().filter(|r| pred(r)).count()
    }
}
