//! Costing strategies: how a movement changes a product's valuation.
//!
//! Strategies are pure. They read the current [`LedgerState`] and a
//! [`Movement`] and return the [`Valuation`] the next kardex row carries; the
//! caller decides whether to persist it.

mod fifo;
mod weighted_average;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kardex_core::{Currency, Money, MoneyError, UnitCost};

use crate::kardex::{CostLayer, LedgerState};
use crate::movement::Movement;

pub use fifo::Fifo;
pub use weighted_average::WeightedAverage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CostingError {
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("unit price must not be negative, got {0}")]
    InvalidPrice(Money),

    #[error("currency mismatch: ledger is {expected}, movement is {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("inconsistent ledger state: {0}")]
    InconsistentState(String),

    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Stock and valuation after applying one movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    pub stock: i64,
    pub unit_cost: UnitCost,
    pub total_cost: Money,
    /// Entry price, or the cost at which withdrawn units left stock.
    pub movement_unit_cost: UnitCost,
    pub movement_value: Money,
    pub layers: Vec<CostLayer>,
}

pub trait CostingStrategy: Send + Sync {
    fn method(&self) -> CostingMethod;

    fn apply(&self, state: &LedgerState, movement: &Movement) -> Result<Valuation, CostingError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostingMethod {
    #[default]
    WeightedAverage,
    Fifo,
}

impl CostingMethod {
    pub fn strategy(self) -> &'static dyn CostingStrategy {
        match self {
            CostingMethod::WeightedAverage => &WeightedAverage,
            CostingMethod::Fifo => &Fifo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CostingMethod::WeightedAverage => "weighted_average",
            CostingMethod::Fifo => "fifo",
        }
    }
}

impl std::fmt::Display for CostingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks shared by every strategy, run before any arithmetic.
fn validate(state: &LedgerState, movement: &Movement) -> Result<(), CostingError> {
    let quantity = movement.quantity();
    if quantity <= 0 {
        return Err(CostingError::InvalidQuantity(quantity));
    }
    match movement {
        Movement::Entry(entry) => {
            if entry.unit_price.is_negative() {
                return Err(CostingError::InvalidPrice(entry.unit_price));
            }
            if let Some(expected) = state.currency() {
                let found = entry.unit_price.currency();
                if expected != found {
                    return Err(CostingError::CurrencyMismatch { expected, found });
                }
            }
        }
        Movement::Withdrawal(_) => {
            let available = state.stock();
            if quantity > available {
                return Err(CostingError::InsufficientStock {
                    requested: quantity,
                    available,
                });
            }
        }
    }
    Ok(())
}

/// Ledger currency for a withdrawal. Only reachable with stock on hand.
fn ledger_currency(state: &LedgerState) -> Result<Currency, CostingError> {
    state
        .currency()
        .ok_or_else(|| CostingError::InconsistentState("withdrawal from an empty ledger".to_string()))
}
