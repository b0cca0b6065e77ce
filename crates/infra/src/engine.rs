//! Kardex engine: the single writer of per-product ledgers.
//!
//! ## Record Flow
//!
//! ```text
//! record_entry / record_withdrawal
//!   ↓
//! 1. Cancellation / deadline check
//!   ↓
//! 2. Validate input, resolve catalog references
//!   ↓
//! 3. Enter the product's critical section (bounded wait)
//!   ↓
//! 4. Load latest row, reject backdated movements
//!   ↓
//! 5. Cost the movement, build the next row
//!   ↓
//! 6. Compare-and-append row + movement
//! ```
//!
//! A sequence conflict at step 6 means another writer slipped past the
//! in-process lock (a second engine over the same store); the engine reloads
//! and recomputes up to `max_conflict_retries` times.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use kardex_catalog::{Catalog, Product};
use kardex_core::{Currency, ExpectedSequence, Money, MovementId, ProductId, SupplierId, UnitCost};
use kardex_inventory::{
    CostingMethod, Entry, KardexRow, LedgerState, LedgerStatus, Movement, Withdrawal,
};

use crate::config::{CostingPolicy, EngineConfig, KardexConfig};
use crate::error::KardexError;
use crate::history::KardexHistory;
use crate::ledger_store::{LedgerAppend, LedgerStore, LedgerStoreError};
use crate::locks::{LockRegistry, ProductGuard};

/// Cooperative cancellation flag shared between a caller and an operation.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-call options for record operations.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub cancellation: Option<Cancellation>,
    /// Abort if the critical section is not entered by then.
    pub deadline: Option<Instant>,
    /// Destination of a withdrawal (project, work order). Ignored for entries.
    pub purpose: Option<String>,
}

impl RecordOptions {
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    fn check(&self) -> Result<(), KardexError> {
        let cancelled = self.cancellation.as_ref().is_some_and(Cancellation::is_cancelled);
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        if cancelled || expired {
            return Err(KardexError::Cancelled);
        }
        Ok(())
    }
}

/// Read-only view of a product's latest valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub stock: i64,
    /// `None` until the first movement fixes the ledger currency.
    pub unit_cost: Option<UnitCost>,
    pub total_cost: Option<Money>,
    pub currency: Option<Currency>,
    pub sequence: u64,
}

impl StockSnapshot {
    fn from_state(product_id: ProductId, state: &LedgerState) -> Self {
        Self {
            product_id,
            stock: state.stock(),
            unit_cost: state.latest().map(|r| r.unit_cost),
            total_cost: state.latest().map(|r| r.total_cost),
            currency: state.currency(),
            sequence: state.sequence(),
        }
    }
}

/// Records movements and serves ledger reads.
///
/// ## Generic Parameters
///
/// - `S`: ledger store (`InMemoryLedgerStore` in tests, any durable adapter
///   in production)
/// - `C`: catalog used to resolve product and supplier references
#[derive(Debug)]
pub struct KardexEngine<S, C> {
    pub(crate) store: S,
    pub(crate) catalog: C,
    pub(crate) locks: LockRegistry,
    policy: CostingPolicy,
    config: EngineConfig,
}

impl<S, C> KardexEngine<S, C> {
    pub fn new(store: S, catalog: C, config: KardexConfig) -> Self {
        Self {
            store,
            catalog,
            locks: LockRegistry::new(),
            policy: config.costing,
            config: config.engine,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl<S, C> KardexEngine<S, C>
where
    S: LedgerStore,
    C: Catalog,
{
    /// Record a purchase of `quantity` units at `unit_price` each.
    #[instrument(skip(self, unit_price, options), fields(product = %product_id, supplier = %supplier_id))]
    pub fn record_entry(
        &self,
        product_id: ProductId,
        supplier_id: SupplierId,
        quantity: i64,
        unit_price: Money,
        occurred_at: DateTime<Utc>,
        options: &RecordOptions,
    ) -> Result<KardexRow, KardexError> {
        options.check()?;
        if quantity <= 0 {
            return Err(KardexError::InvalidQuantity(quantity));
        }
        if unit_price.is_negative() {
            return Err(KardexError::InvalidPrice(unit_price));
        }

        let product = self.catalog.resolve_product(product_id)?;
        self.catalog.resolve_supplier(supplier_id)?;

        let movement = Movement::Entry(Entry {
            id: MovementId::new(),
            product_id,
            supplier_id,
            quantity,
            unit_price,
            occurred_at,
        });
        self.commit(&product, movement, options)
    }

    /// Record `quantity` units leaving stock, valued by the ledger's method.
    #[instrument(skip(self, options), fields(product = %product_id))]
    pub fn record_withdrawal(
        &self,
        product_id: ProductId,
        quantity: i64,
        occurred_at: DateTime<Utc>,
        options: &RecordOptions,
    ) -> Result<KardexRow, KardexError> {
        options.check()?;
        if quantity <= 0 {
            return Err(KardexError::InvalidQuantity(quantity));
        }

        let product = self.catalog.resolve_product(product_id)?;

        let movement = Movement::Withdrawal(Withdrawal {
            id: MovementId::new(),
            product_id,
            quantity,
            occurred_at,
            purpose: options.purpose.clone(),
        });
        self.commit(&product, movement, options)
    }

    pub fn current_stock(&self, product_id: ProductId) -> Result<StockSnapshot, KardexError> {
        let state = LedgerState::from_latest(self.store.load_latest(product_id)?);
        Ok(StockSnapshot::from_state(product_id, &state))
    }

    pub fn ledger_status(&self, product_id: ProductId) -> Result<LedgerStatus, KardexError> {
        Ok(LedgerState::from_latest(self.store.load_latest(product_id)?).status())
    }

    /// Rows with `from <= occurred_at <= to`, read lazily page by page.
    pub fn history(
        &self,
        product_id: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> KardexHistory<'_, S> {
        KardexHistory::new(&self.store, product_id, from, to, self.config.history_page_size)
    }

    /// Costing method a ledger uses: pinned by its first row, else policy.
    pub fn method_for(&self, product: &Product, state: &LedgerState) -> CostingMethod {
        state
            .method()
            .unwrap_or_else(|| self.policy.method_for(product))
    }

    pub(crate) fn enter(&self, product_id: ProductId) -> Result<ProductGuard, KardexError> {
        self.enter_before(product_id, None)
    }

    /// Enter the product's section, waiting no longer than the lock timeout
    /// and never past `deadline`.
    fn enter_before(
        &self,
        product_id: ProductId,
        deadline: Option<Instant>,
    ) -> Result<ProductGuard, KardexError> {
        let timeout = self.config.lock_timeout();
        let budget = deadline.map_or(timeout, |d| {
            timeout.min(d.saturating_duration_since(Instant::now()))
        });
        if let Some(guard) = self.locks.acquire(product_id, budget) {
            return Ok(guard);
        }
        if budget < timeout {
            debug!(product = %product_id, waited = ?budget, "deadline passed while waiting for lock");
            return Err(KardexError::Cancelled);
        }
        warn!(product = %product_id, waited = ?timeout, "lock acquisition timed out");
        Err(KardexError::LockTimeout {
            product_id,
            waited: timeout,
        })
    }

    fn commit(
        &self,
        product: &Product,
        movement: Movement,
        options: &RecordOptions,
    ) -> Result<KardexRow, KardexError> {
        let product_id = movement.product_id();
        options.check()?;
        let _guard = self.enter_before(product_id, options.deadline)?;
        // The wait may have outlived a cancellation or the deadline.
        options.check()?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let state = LedgerState::from_latest(self.store.load_latest(product_id)?);
            debug!(sequence = state.sequence(), stock = state.stock(), "loaded ledger tail");

            if let Some(latest) = state.last_occurred_at() {
                if movement.occurred_at() < latest {
                    return Err(KardexError::BackdatedMovement {
                        occurred_at: movement.occurred_at(),
                        latest,
                    });
                }
            }

            let method = self.method_for(product, &state);
            let row = KardexRow::next(&state, method, &movement, Utc::now())?;
            let append = LedgerAppend {
                row,
                movement: movement.clone(),
            };

            match self
                .store
                .append_atomic(append, ExpectedSequence::exact(state.sequence()))
            {
                Ok(row) => {
                    debug!(sequence = row.sequence, stock = row.stock, %method, "kardex row appended");
                    return Ok(row);
                }
                Err(LedgerStoreError::SequenceConflict { expected, found })
                    if attempts <= self.config.max_conflict_retries =>
                {
                    warn!(expected, found, attempts, "sequence conflict, recomputing");
                }
                Err(LedgerStoreError::SequenceConflict { .. }) => {
                    warn!(attempts, "sequence conflict retries exhausted");
                    return Err(KardexError::SequenceConflict { attempts });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
