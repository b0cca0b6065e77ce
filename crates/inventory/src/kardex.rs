//! Kardex ledger rows and the per-product ledger state they fold into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Currency, Money, MovementId, ProductId, SupplierId, UnitCost};

use crate::costing::{CostingError, CostingMethod};
use crate::movement::{LoggedMovement, Movement, MovementKind};

/// An open FIFO lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLayer {
    pub quantity: i64,
    pub unit_cost: UnitCost,
    pub received_at: DateTime<Utc>,
    /// Sequence of the kardex row whose entry opened this lot.
    pub source_sequence: u64,
}

/// The movement that produced a kardex row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub movement_id: MovementId,
    pub kind: MovementKind,
    pub quantity: i64,
    /// Entry price for entries, cost of the issued units for withdrawals.
    pub unit_cost: UnitCost,
    /// `quantity × unit_cost`, rounded once.
    pub value: Money,
    pub supplier_id: Option<SupplierId>,
}

impl MovementSummary {
    /// Signed effect on stock: `+quantity` for entries, `-quantity` for withdrawals.
    pub fn stock_delta(&self) -> i64 {
        match self.kind {
            MovementKind::Entry => self.quantity,
            MovementKind::Withdrawal => -self.quantity,
        }
    }
}

/// One append-only ledger row: the product's stock and valuation right after
/// a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KardexRow {
    pub product_id: ProductId,
    /// Monotonic, gap-free, starting at 1.
    pub sequence: u64,
    pub stock: i64,
    pub unit_cost: UnitCost,
    pub total_cost: Money,
    pub currency: Currency,
    pub method: CostingMethod,
    pub movement: MovementSummary,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    /// Open lots after this movement (FIFO only; empty for weighted average).
    pub layers: Vec<CostLayer>,
}

impl KardexRow {
    /// Value `movement` against `state` and build the row that follows it.
    pub fn next(
        state: &LedgerState,
        method: CostingMethod,
        movement: &Movement,
        recorded_at: DateTime<Utc>,
    ) -> Result<KardexRow, CostingError> {
        if let LedgerState::Active(latest) = state {
            if latest.product_id != movement.product_id() {
                return Err(CostingError::InconsistentState(format!(
                    "movement for product {} applied to ledger of {}",
                    movement.product_id(),
                    latest.product_id
                )));
            }
        }

        let valuation = method.strategy().apply(state, movement)?;
        let currency = valuation.unit_cost.currency();

        Ok(KardexRow {
            product_id: movement.product_id(),
            sequence: state.sequence() + 1,
            stock: valuation.stock,
            unit_cost: valuation.unit_cost,
            total_cost: valuation.total_cost,
            currency,
            method,
            movement: MovementSummary {
                movement_id: movement.id(),
                kind: movement.kind(),
                quantity: movement.quantity(),
                unit_cost: valuation.movement_unit_cost,
                value: valuation.movement_value,
                supplier_id: movement.supplier_id(),
            },
            occurred_at: movement.occurred_at(),
            recorded_at,
            layers: valuation.layers,
        })
    }

    /// Check this row against the ledger invariants, given its predecessor.
    pub fn check_invariants(&self, previous: Option<&KardexRow>) -> Result<(), String> {
        let expected_sequence = previous.map_or(1, |p| p.sequence + 1);
        if self.sequence != expected_sequence {
            return Err(format!(
                "sequence {} does not follow {}",
                self.sequence,
                expected_sequence - 1
            ));
        }
        if self.stock < 0 {
            return Err(format!("negative stock {} at sequence {}", self.stock, self.sequence));
        }
        if self.unit_cost.is_negative() {
            return Err(format!("negative unit cost at sequence {}", self.sequence));
        }
        if self.unit_cost.currency() != self.currency || self.total_cost.currency() != self.currency
        {
            return Err(format!("mixed currencies at sequence {}", self.sequence));
        }
        let extended = self
            .unit_cost
            .extend(self.stock)
            .map_err(|e| format!("sequence {}: {e}", self.sequence))?;
        if (extended.minor() - self.total_cost.minor()).abs() > 1 {
            return Err(format!(
                "total cost {} differs from stock x unit cost {} at sequence {}",
                self.total_cost, extended, self.sequence
            ));
        }
        if let Some(previous) = previous {
            if previous.currency != self.currency {
                return Err(format!(
                    "currency changed from {} to {} at sequence {}",
                    previous.currency, self.currency, self.sequence
                ));
            }
            let delta = self.movement.stock_delta();
            if previous.stock.checked_add(delta) != Some(self.stock) {
                return Err(format!(
                    "stock {} does not follow {} {:+} at sequence {}",
                    self.stock, previous.stock, delta, self.sequence
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// No movement recorded yet.
    Uninitialized,
    Active,
    /// Active with zero stock.
    Depleted,
}

/// Per-product ledger state machine: `Uninitialized → Active → Active …`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerState {
    Uninitialized,
    Active(KardexRow),
}

impl LedgerState {
    pub fn from_latest(latest: Option<KardexRow>) -> Self {
        match latest {
            Some(row) => LedgerState::Active(row),
            None => LedgerState::Uninitialized,
        }
    }

    pub fn latest(&self) -> Option<&KardexRow> {
        match self {
            LedgerState::Uninitialized => None,
            LedgerState::Active(row) => Some(row),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.latest().map_or(0, |r| r.sequence)
    }

    pub fn stock(&self) -> i64 {
        self.latest().map_or(0, |r| r.stock)
    }

    pub fn currency(&self) -> Option<Currency> {
        self.latest().map(|r| r.currency)
    }

    pub fn method(&self) -> Option<CostingMethod> {
        self.latest().map(|r| r.method)
    }

    pub fn layers(&self) -> &[CostLayer] {
        self.latest().map_or(&[], |r| r.layers.as_slice())
    }

    pub fn last_occurred_at(&self) -> Option<DateTime<Utc>> {
        self.latest().map(|r| r.occurred_at)
    }

    pub fn status(&self) -> LedgerStatus {
        match self.latest() {
            None => LedgerStatus::Uninitialized,
            Some(row) if row.stock == 0 => LedgerStatus::Depleted,
            Some(_) => LedgerStatus::Active,
        }
    }
}

/// Re-run `method` over a movement log from the zero state.
///
/// Movements are applied by effective date, ties broken by log position; each
/// row is stamped with its movement's `recorded_at`, so the output depends on
/// the log alone.
/// Method pinned by the first movement ever logged for a ledger.
pub fn pinned_method(log: &[LoggedMovement]) -> Option<CostingMethod> {
    log.iter().min_by_key(|m| m.position).map(|m| m.method)
}

pub fn rebuild_rows(
    method: CostingMethod,
    log: &[LoggedMovement],
) -> Result<Vec<KardexRow>, CostingError> {
    let mut ordered: Vec<&LoggedMovement> = log.iter().collect();
    ordered.sort_by_key(|m| m.replay_key());

    let mut rows = Vec::with_capacity(ordered.len());
    let mut state = LedgerState::Uninitialized;
    for logged in ordered {
        let row = KardexRow::next(&state, method, &logged.movement, logged.recorded_at)?;
        rows.push(row.clone());
        state = LedgerState::Active(row);
    }
    Ok(rows)
}
