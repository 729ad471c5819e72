//! Per-kind ID allocation for one merge run

use crate::{MergeError, RecordKind, Result};

/// Monotonic ID counters, one per record kind
///
/// Counters start at 0 and only ever grow. [`IdAllocator::observe`] raises a
/// counter past IDs already in use, [`IdAllocator::next`] hands out the value
/// after the counter. A value returned by `next` is therefore never equal to
/// any value previously returned or observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdAllocator {
    counters: [i64; 3],
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free ID for `kind`
    pub fn next(&mut self, kind: RecordKind) -> Result<i64> {
        let counter = &mut self.counters[kind.index()];
        let id = counter
            .checked_add(1)
            .ok_or(MergeError::IdSpaceExhausted {
                kind,
                last: *counter,
            })?;
        *counter = id;
        Ok(id)
    }

    /// Raise the counter for `kind` to at least `id` without allocating
    #[inline]
    pub fn observe(&mut self, kind: RecordKind, id: i64) {
        let counter = &mut self.counters[kind.index()];
        *counter = (*counter).max(id);
    }

    /// Highest ID allocated or observed so far for `kind`
    #[inline]
    pub fn current(&self, kind: RecordKind) -> i64 {
        self.counters[kind.index()]
    }
}
