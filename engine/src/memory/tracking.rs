/*!
 * Allocation Tracking
 * Debug-build overlay recording every live allocation with its call site
 */

use crate::core::types::{Address, Size};
use ahash::RandomState;
use dashmap::DashMap;
use serde::Serialize;
use std::panic::Location;

/// One live allocation and where it came from
#[derive(Debug, Clone, Serialize)]
pub struct AllocationRecord {
    pub address: Address,
    pub size: Size,
    pub file: &'static str,
    pub line: u32,
}

/// Concurrent table of live allocations keyed by address
pub(crate) struct AllocationTracker {
    records: DashMap<Address, AllocationRecord, RandomState>,
}

impl AllocationTracker {
    pub(crate) fn new() -> Self {
        Self {
            records: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub(crate) fn record(&self, address: Address, size: Size, caller: &'static Location<'static>) {
        self.records.insert(
            address,
            AllocationRecord {
                address,
                size,
                file: caller.file(),
                line: caller.line(),
            },
        );
    }

    pub(crate) fn forget(&self, address: Address) {
        self.records.remove(&address);
    }

    /// Every surviving record, in address order.
    pub(crate) fn leaks(&self) -> Vec<AllocationRecord> {
        let mut leaks: Vec<AllocationRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        leaks.sort_by_key(|record| record.address);
        leaks
    }
}
