use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use kardex_catalog::CatalogError;
use kardex_core::{Currency, Money, MoneyError, ProductId, SupplierId};
use kardex_inventory::CostingError;

use crate::ledger_store::LedgerStoreError;

/// Failure of a kardex engine operation.
///
/// Every variant except `SequenceConflict`, `LockTimeout`, `StoreUnavailable`
/// and `Corrupted` is raised before anything is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KardexError {
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("unit price must not be negative, got {0}")]
    InvalidPrice(Money),

    #[error("currency mismatch: ledger is {expected}, movement is {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("unknown supplier {0}")]
    UnknownSupplier(SupplierId),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("movement dated {occurred_at} precedes latest row dated {latest}")]
    BackdatedMovement {
        occurred_at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("sequence conflict persisted after {attempts} attempts")]
    SequenceConflict { attempts: u32 },

    #[error("timed out after {waited:?} waiting for product {product_id}")]
    LockTimeout {
        product_id: ProductId,
        waited: Duration,
    },

    #[error("ledger store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("operation cancelled before entering the critical section")]
    Cancelled,

    #[error("arithmetic error: {0}")]
    Arithmetic(MoneyError),

    #[error("ledger corrupted: {0}")]
    Corrupted(String),
}

impl KardexError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KardexError::LockTimeout { .. } | KardexError::SequenceConflict { .. }
        )
    }
}

impl From<CostingError> for KardexError {
    fn from(value: CostingError) -> Self {
        match value {
            CostingError::InvalidQuantity(q) => KardexError::InvalidQuantity(q),
            CostingError::InvalidPrice(p) => KardexError::InvalidPrice(p),
            CostingError::CurrencyMismatch { expected, found } => {
                KardexError::CurrencyMismatch { expected, found }
            }
            CostingError::InsufficientStock {
                requested,
                available,
            } => KardexError::InsufficientStock {
                requested,
                available,
            },
            CostingError::InconsistentState(msg) => KardexError::Corrupted(msg),
            CostingError::Money(e) => KardexError::Arithmetic(e),
        }
    }
}

impl From<CatalogError> for KardexError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::UnknownProduct(id) => KardexError::UnknownProduct(id),
            CatalogError::UnknownSupplier(id) => KardexError::UnknownSupplier(id),
            CatalogError::Unavailable(msg) => KardexError::CatalogUnavailable(msg),
        }
    }
}

impl From<LedgerStoreError> for KardexError {
    fn from(value: LedgerStoreError) -> Self {
        match value {
            LedgerStoreError::SequenceConflict { .. } => KardexError::SequenceConflict { attempts: 1 },
            LedgerStoreError::Unavailable(msg) => KardexError::StoreUnavailable(msg),
            LedgerStoreError::InvalidAppend(msg) | LedgerStoreError::Corrupted(msg) => {
                KardexError::Corrupted(msg)
            }
        }
    }
}
