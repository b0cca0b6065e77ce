use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kardex_core::{ExpectedSequence, ProductId};
use kardex_inventory::{KardexRow, LoggedMovement, Movement};

/// A kardex row together with the movement that produced it, ready to be
/// committed in one step.
///
/// The store writes both or neither: a row without its movement in the log
/// (or the reverse) would make replay disagree with the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAppend {
    pub row: KardexRow,
    pub movement: Movement,
}

/// Ledger store operation error.
///
/// These are **infrastructure errors** (durability, concurrency) as opposed to
/// costing or validation errors, which the engine raises before any write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerStoreError {
    /// Compare-and-append failed: another writer moved the tail.
    #[error("sequence conflict: expected tail {expected}, found {found}")]
    SequenceConflict { expected: u64, found: u64 },

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    /// The append itself is malformed (wrong product, wrong sequence number).
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// Stored data violates ledger invariants.
    #[error("ledger corrupted: {0}")]
    Corrupted(String),
}

/// Per-product, append-only kardex storage plus the raw movement log.
///
/// ## Append Semantics
///
/// `append_atomic()` is compare-and-append: it succeeds only when the current
/// tail sequence equals `expected`, and then writes the row and logs the
/// movement atomically. The row must carry `expected.next()` as its sequence.
///
/// ## Read Semantics
///
/// Reads observe committed rows only. `load_rows()` pages through a ledger in
/// sequence order, starting strictly after `after_sequence`.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - keep sequences gap-free and unique per product
/// - never expose a row whose movement is not in the log
/// - return movements from `load_movement_history()` in insertion order
pub trait LedgerStore: Send + Sync {
    /// Latest row of a product's ledger, `None` if no movement was recorded.
    fn load_latest(&self, product_id: ProductId) -> Result<Option<KardexRow>, LedgerStoreError>;

    /// Up to `limit` rows with `sequence > after_sequence`, in order.
    fn load_rows(
        &self,
        product_id: ProductId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<KardexRow>, LedgerStoreError>;

    fn append_atomic(
        &self,
        append: LedgerAppend,
        expected: ExpectedSequence,
    ) -> Result<KardexRow, LedgerStoreError>;

    /// Raw movement log of a product, in insertion order.
    fn load_movement_history(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LoggedMovement>, LedgerStoreError>;

    /// Swap the stored ledger for `rows` if the tail still equals `expected`.
    /// The movement log is left untouched.
    fn replace_ledger(
        &self,
        product_id: ProductId,
        rows: Vec<KardexRow>,
        expected: ExpectedSequence,
    ) -> Result<(), LedgerStoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load_latest(&self, product_id: ProductId) -> Result<Option<KardexRow>, LedgerStoreError> {
        (**self).load_latest(product_id)
    }

    fn load_rows(
        &self,
        product_id: ProductId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<KardexRow>, LedgerStoreError> {
        (**self).load_rows(product_id, after_sequence, limit)
    }

    fn append_atomic(
        &self,
        append: LedgerAppend,
        expected: ExpectedSequence,
    ) -> Result<KardexRow, LedgerStoreError> {
        (**self).append_atomic(append, expected)
    }

    fn load_movement_history(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LoggedMovement>, LedgerStoreError> {
        (**self).load_movement_history(product_id)
    }

    fn replace_ledger(
        &self,
        product_id: ProductId,
        rows: Vec<KardexRow>,
        expected: ExpectedSequence,
    ) -> Result<(), LedgerStoreError> {
        (**self).replace_ledger(product_id, rows, expected)
    }
}
