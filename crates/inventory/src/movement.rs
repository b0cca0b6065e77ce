use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Money, MovementId, ProductId, SupplierId};

use crate::costing::CostingMethod;

/// Inbound stock: a purchase from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: MovementId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub quantity: i64,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Outbound stock: a sale or consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: MovementId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
    /// Free-text destination (project, work order).
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Entry,
    Withdrawal,
}

/// A stock-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Movement {
    Entry(Entry),
    Withdrawal(Withdrawal),
}

impl Movement {
    pub fn id(&self) -> MovementId {
        match self {
            Movement::Entry(e) => e.id,
            Movement::Withdrawal(w) => w.id,
        }
    }

    pub fn kind(&self) -> MovementKind {
        match self {
            Movement::Entry(_) => MovementKind::Entry,
            Movement::Withdrawal(_) => MovementKind::Withdrawal,
        }
    }

    pub fn product_id(&self) -> ProductId {
        match self {
            Movement::Entry(e) => e.product_id,
            Movement::Withdrawal(w) => w.product_id,
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            Movement::Entry(e) => e.quantity,
            Movement::Withdrawal(w) => w.quantity,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Movement::Entry(e) => e.occurred_at,
            Movement::Withdrawal(w) => w.occurred_at,
        }
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        match self {
            Movement::Entry(e) => Some(e.supplier_id),
            Movement::Withdrawal(_) => None,
        }
    }
}

/// A movement as held by the movement log, with its insertion position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedMovement {
    /// Insertion order within the product's log (1-based).
    pub position: u64,
    /// When the movement was committed (also stamped on its kardex row).
    pub recorded_at: DateTime<Utc>,
    /// Costing method of the ledger at commit time. Copied from the row when
    /// logged and never rewritten, so replay does not depend on stored rows.
    pub method: CostingMethod,
    pub movement: Movement,
}

impl LoggedMovement {
    /// Sort key for replay: effective date, then insertion order.
    pub fn replay_key(&self) -> (DateTime<Utc>, u64) {
        (self.movement.occurred_at(), self.position)
    }
}
