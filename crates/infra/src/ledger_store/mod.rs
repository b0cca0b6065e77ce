//! Kardex ledger store boundary.
//!
//! Defines the persistence-facing abstraction the engine appends through,
//! without making storage assumptions, plus an in-memory implementation.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{LedgerAppend, LedgerStore, LedgerStoreError};
