use std::collections::HashMap;
use std::sync::RwLock;

use kardex_core::{ExpectedSequence, ProductId};
use kardex_inventory::{KardexRow, LoggedMovement};

use super::r#trait::{LedgerAppend, LedgerStore, LedgerStoreError};

#[derive(Debug, Default)]
struct ProductLedger {
    rows: Vec<KardexRow>,
    log: Vec<LoggedMovement>,
}

impl ProductLedger {
    fn tail(&self) -> u64 {
        self.rows.last().map(|r| r.sequence).unwrap_or(0)
    }
}

/// In-memory kardex store.
///
/// Intended for tests/dev. One write lock covers both the ledger and the
/// movement log, which is what makes `append_atomic` atomic.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<ProductId, ProductLedger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> LedgerStoreError {
    LedgerStoreError::Unavailable("lock poisoned".to_string())
}

fn check_contiguous(product_id: ProductId, rows: &[KardexRow]) -> Result<(), LedgerStoreError> {
    for (idx, row) in rows.iter().enumerate() {
        if row.product_id != product_id {
            return Err(LedgerStoreError::InvalidAppend(format!(
                "row {idx} belongs to product {}",
                row.product_id
            )));
        }
        if row.sequence != idx as u64 + 1 {
            return Err(LedgerStoreError::InvalidAppend(format!(
                "row {idx} carries sequence {}",
                row.sequence
            )));
        }
    }
    Ok(())
}

impl LedgerStore for InMemoryLedgerStore {
    fn load_latest(&self, product_id: ProductId) -> Result<Option<KardexRow>, LedgerStoreError> {
        let ledgers = self.ledgers.read().map_err(poisoned)?;
        Ok(ledgers.get(&product_id).and_then(|l| l.rows.last().cloned()))
    }

    fn load_rows(
        &self,
        product_id: ProductId,
        after_sequence: u64,
        limit: usize,
    ) -> Result<Vec<KardexRow>, LedgerStoreError> {
        let ledgers = self.ledgers.read().map_err(poisoned)?;
        let Some(ledger) = ledgers.get(&product_id) else {
            return Ok(Vec::new());
        };
        // Sequences are 1-based and gap-free, so the row after `after_sequence`
        // sits at index `after_sequence`.
        let start = usize::try_from(after_sequence).unwrap_or(usize::MAX);
        Ok(ledger.rows.iter().skip(start).take(limit).cloned().collect())
    }

    fn append_atomic(
        &self,
        append: LedgerAppend,
        expected: ExpectedSequence,
    ) -> Result<KardexRow, LedgerStoreError> {
        let LedgerAppend { row, movement } = append;
        let product_id = row.product_id;

        if movement.product_id() != product_id {
            return Err(LedgerStoreError::InvalidAppend(format!(
                "row for product {product_id} paired with movement for {}",
                movement.product_id()
            )));
        }
        if row.movement.movement_id != movement.id() {
            return Err(LedgerStoreError::InvalidAppend(
                "row does not describe the paired movement".to_string(),
            ));
        }
        if row.sequence != expected.next() {
            return Err(LedgerStoreError::InvalidAppend(format!(
                "row carries sequence {}, expected {}",
                row.sequence,
                expected.next()
            )));
        }

        let mut ledgers = self.ledgers.write().map_err(poisoned)?;
        let ledger = ledgers.entry(product_id).or_default();

        let found = ledger.tail();
        if !expected.matches(found) {
            return Err(LedgerStoreError::SequenceConflict {
                expected: expected.value(),
                found,
            });
        }
        // Every logged movement has exactly one row until the ledger is
        // repaired; appending onto a drifted ledger would bury the drift.
        if ledger.rows.len() != ledger.log.len() {
            return Err(LedgerStoreError::Corrupted(format!(
                "{} rows for {} logged movements",
                ledger.rows.len(),
                ledger.log.len()
            )));
        }
        row.check_invariants(ledger.rows.last())
            .map_err(LedgerStoreError::InvalidAppend)?;

        let position = ledger.log.len() as u64 + 1;
        ledger.log.push(LoggedMovement {
            position,
            recorded_at: row.recorded_at,
            method: row.method,
            movement,
        });
        ledger.rows.push(row.clone());
        Ok(row)
    }

    fn load_movement_history(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LoggedMovement>, LedgerStoreError> {
        let ledgers = self.ledgers.read().map_err(poisoned)?;
        Ok(ledgers
            .get(&product_id)
            .map(|l| l.log.clone())
            .unwrap_or_default())
    }

    fn replace_ledger(
        &self,
        product_id: ProductId,
        rows: Vec<KardexRow>,
        expected: ExpectedSequence,
    ) -> Result<(), LedgerStoreError> {
        check_contiguous(product_id, &rows)?;

        let mut ledgers = self.ledgers.write().map_err(poisoned)?;
        let ledger = ledgers.entry(product_id).or_default();

        let found = ledger.tail();
        if !expected.matches(found) {
            return Err(LedgerStoreError::SequenceConflict {
                expected: expected.value(),
                found,
            });
        }
        ledger.rows = rows;
        Ok(())
    }
}
