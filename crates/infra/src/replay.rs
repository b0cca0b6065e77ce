//! Ledger reconciliation: rebuild from the movement log, verify, repair.
//!
//! The movement log is the source of truth, including the costing method it
//! pinned when the ledger was opened. Rebuilding re-runs that method over the
//! log from the zero state; verification compares the result with the stored
//! rows; repair swaps the stored rows for the rebuilt ones under the
//! product's lock.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use kardex_catalog::Catalog;
use kardex_core::{ExpectedSequence, ProductId};
use kardex_inventory::{pinned_method, rebuild_rows, CostingError, KardexRow, LoggedMovement};

use crate::engine::{Cancellation, KardexEngine};
use crate::ledger_store::{LedgerStore, LedgerStoreError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("ledger store error: {0}")]
    Store(#[from] LedgerStoreError),

    #[error("costing error: {0}")]
    Costing(#[from] CostingError),

    #[error("timed out waiting for product {0}")]
    LockTimeout(ProductId),

    #[error("replay cancelled")]
    Cancelled,
}

/// How a stored row departs from the rebuilt one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// The log implies a row the store does not have.
    MissingRow,
    /// The store holds a row the log does not explain.
    ExtraRow,
    /// Both exist but disagree on `field`.
    FieldMismatch { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// First sequence number at which the ledgers differ.
    pub sequence: u64,
    pub kind: DivergenceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub product_id: ProductId,
    pub stored_rows: usize,
    pub rebuilt_rows: usize,
    pub divergence: Option<Divergence>,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.divergence.is_none()
    }
}

/// Summary of a multi-product verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayProgress {
    pub total_products: usize,
    pub processed_products: usize,
    pub divergent: Vec<ProductId>,
}

/// First field on which two rows with the same sequence differ.
fn mismatched_field(stored: &KardexRow, rebuilt: &KardexRow) -> Option<&'static str> {
    let checks: [(&'static str, bool); 9] = [
        ("stock", stored.stock == rebuilt.stock),
        ("unit_cost", stored.unit_cost == rebuilt.unit_cost),
        ("total_cost", stored.total_cost == rebuilt.total_cost),
        ("currency", stored.currency == rebuilt.currency),
        ("method", stored.method == rebuilt.method),
        ("movement", stored.movement == rebuilt.movement),
        ("occurred_at", stored.occurred_at == rebuilt.occurred_at),
        ("recorded_at", stored.recorded_at == rebuilt.recorded_at),
        ("layers", stored.layers == rebuilt.layers),
    ];
    checks
        .into_iter()
        .find(|(_, equal)| !equal)
        .map(|(field, _)| field)
        .or_else(|| (stored.product_id != rebuilt.product_id).then_some("product_id"))
}

/// First divergence between stored and rebuilt ledgers, if any.
pub fn compare_ledgers(stored: &[KardexRow], rebuilt: &[KardexRow]) -> Option<Divergence> {
    for (idx, rebuilt_row) in rebuilt.iter().enumerate() {
        let sequence = idx as u64 + 1;
        let Some(stored_row) = stored.get(idx) else {
            return Some(Divergence {
                sequence,
                kind: DivergenceKind::MissingRow,
            });
        };
        if stored_row.sequence != sequence {
            return Some(Divergence {
                sequence,
                kind: DivergenceKind::FieldMismatch { field: "sequence" },
            });
        }
        if let Some(field) = mismatched_field(stored_row, rebuilt_row) {
            return Some(Divergence {
                sequence,
                kind: DivergenceKind::FieldMismatch { field },
            });
        }
    }
    (stored.len() > rebuilt.len()).then(|| Divergence {
        sequence: rebuilt.len() as u64 + 1,
        kind: DivergenceKind::ExtraRow,
    })
}

impl<S, C> KardexEngine<S, C>
where
    S: LedgerStore,
    C: Catalog,
{
    fn stored_rows(&self, product_id: ProductId) -> Result<Vec<KardexRow>, LedgerStoreError> {
        let page_size = self.config().history_page_size.max(1);
        let mut rows: Vec<KardexRow> = Vec::new();
        loop {
            let after = rows.last().map_or(0, |r| r.sequence);
            let page = self.store.load_rows(product_id, after, page_size)?;
            let last_page = page.len() < page_size;
            rows.extend(page);
            if last_page {
                return Ok(rows);
            }
        }
    }

    fn rebuild_from(&self, log: &[LoggedMovement]) -> Result<Vec<KardexRow>, ReplayError> {
        let Some(method) = pinned_method(log) else {
            return Ok(Vec::new());
        };
        let rows = rebuild_rows(method, log)?;
        debug!(rows = rows.len(), %method, "ledger rebuilt");
        Ok(rows)
    }

    /// Canonical ledger implied by the movement log.
    ///
    /// Two rebuilds of the same log are identical, down to timestamps.
    #[instrument(skip(self), fields(product = %product_id))]
    pub fn rebuild(&self, product_id: ProductId) -> Result<Vec<KardexRow>, ReplayError> {
        let log = self.store.load_movement_history(product_id)?;
        self.rebuild_from(&log)
    }

    /// Compare the stored ledger with a rebuild; read-only and lock-free.
    ///
    /// Rows committed after the log was read are left out of the comparison,
    /// since their movements are logged with them.
    #[instrument(skip(self), fields(product = %product_id))]
    pub fn verify(&self, product_id: ProductId) -> Result<VerifyReport, ReplayError> {
        let log = self.store.load_movement_history(product_id)?;
        let rebuilt = self.rebuild_from(&log)?;
        let mut stored = self.stored_rows(product_id)?;
        if stored.len() > log.len() {
            let logged_now = self.store.load_movement_history(product_id)?.len();
            let unexplained = stored.len().saturating_sub(logged_now);
            stored.truncate(log.len() + unexplained);
        }
        let divergence = compare_ledgers(&stored, &rebuilt);
        if let Some(d) = &divergence {
            warn!(sequence = d.sequence, kind = ?d.kind, "ledger diverges from movement log");
        }
        Ok(VerifyReport {
            product_id,
            stored_rows: stored.len(),
            rebuilt_rows: rebuilt.len(),
            divergence,
        })
    }

    /// Overwrite a divergent ledger with its rebuild.
    ///
    /// Runs under the product's lock, so no record call interleaves. Returns
    /// the report describing the ledger as it was before the repair.
    #[instrument(skip(self), fields(product = %product_id))]
    pub fn repair(&self, product_id: ProductId) -> Result<VerifyReport, ReplayError> {
        let _guard = self
            .enter(product_id)
            .map_err(|_| ReplayError::LockTimeout(product_id))?;

        let rebuilt = self.rebuild(product_id)?;
        let stored = self.stored_rows(product_id)?;
        let divergence = compare_ledgers(&stored, &rebuilt);
        let report = VerifyReport {
            product_id,
            stored_rows: stored.len(),
            rebuilt_rows: rebuilt.len(),
            divergence,
        };

        if let Some(d) = divergence {
            let tail = stored.last().map_or(0, |r| r.sequence);
            self.store
                .replace_ledger(product_id, rebuilt, ExpectedSequence::exact(tail))?;
            info!(
                from_sequence = d.sequence,
                stored = report.stored_rows,
                rebuilt = report.rebuilt_rows,
                "ledger repaired"
            );
        }
        Ok(report)
    }

    /// Verify several products, stopping between products once cancelled.
    pub fn verify_all(
        &self,
        products: &[ProductId],
        cancellation: &Cancellation,
    ) -> Result<ReplayProgress, ReplayError> {
        let mut progress = ReplayProgress {
            total_products: products.len(),
            ..ReplayProgress::default()
        };
        for product_id in products {
            if cancellation.is_cancelled() {
                return Err(ReplayError::Cancelled);
            }
            if !self.verify(*product_id)?.is_consistent() {
                progress.divergent.push(*product_id);
            }
            progress.processed_products += 1;
        }
        Ok(progress)
    }
}
