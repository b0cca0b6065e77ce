//! Inventory kardex domain module.
//!
//! Movements (entries and withdrawals), kardex ledger rows and the costing
//! strategies that value them, implemented purely as deterministic domain
//! logic (no IO, no locking, no storage).

pub mod costing;
pub mod kardex;
pub mod movement;

pub use costing::{CostingError, CostingMethod, CostingStrategy, Fifo, Valuation, WeightedAverage};
pub use kardex::{pinned_method, rebuild_rows, CostLayer, KardexRow, LedgerState, LedgerStatus, MovementSummary};
pub use movement::{Entry, LoggedMovement, Movement, MovementKind, Withdrawal};
