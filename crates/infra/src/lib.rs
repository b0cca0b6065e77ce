//! Infrastructure layer: ledger store, kardex engine, replay, reports, config.

pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod ledger_store;
pub mod locks;
pub mod replay;
pub mod reports;

#[cfg(test)]
mod integration_tests;

pub use config::{CostingPolicy, EngineConfig, KardexConfig};
pub use engine::{Cancellation, KardexEngine, RecordOptions, StockSnapshot};
pub use error::KardexError;
pub use history::{HistoryIter, KardexHistory};
pub use ledger_store::{InMemoryLedgerStore, LedgerAppend, LedgerStore, LedgerStoreError};
pub use locks::LockRegistry;
pub use replay::{Divergence, DivergenceKind, ReplayError, ReplayProgress, VerifyReport};
pub use reports::{IncomeLine, ReportFilter, StockLine, StockReport, SupplierFilter, WithdrawalLine};
