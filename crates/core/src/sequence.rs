//! Optimistic sequence expectation for per-product ledgers.

use serde::{Deserialize, Serialize};

/// The sequence number a writer expects to find at the ledger tail.
///
/// `0` means "the ledger has no rows yet". A store accepts an append only if
/// its current tail equals the expectation (compare-and-append).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedSequence(u64);

impl ExpectedSequence {
    /// Expect an empty ledger.
    pub const EMPTY: ExpectedSequence = ExpectedSequence(0);

    pub fn exact(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Sequence number the next appended row must carry.
    pub fn next(self) -> u64 {
        self.0 + 1
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }
}
