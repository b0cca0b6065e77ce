//! Integration tests for the full record pipeline.
//!
//! Tests: Engine → LockRegistry → CostingStrategy → LedgerStore → Replay
//!
//! Verifies:
//! - Concurrent writers on one product never lose or duplicate a row
//! - Sequence conflicts are retried, then surfaced
//! - Store outages surface immediately with nothing written
//! - Distinct products do not block each other

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use chrono::{DateTime, Duration, Utc};

    use kardex_catalog::{InMemoryCatalog, NewProduct, NewSupplier, Product, Supplier};
    use kardex_core::{Currency, Entity, ExpectedSequence, Money, ProductId, SupplierId, TenantId};
    use kardex_inventory::{CostingMethod, KardexRow, LoggedMovement};

    use crate::config::{CostingPolicy, KardexConfig};
    use crate::engine::{KardexEngine, RecordOptions};
    use crate::error::KardexError;
    use crate::ledger_store::{InMemoryLedgerStore, LedgerAppend, LedgerStore, LedgerStoreError};

    /// Store wrapper that fails the next appends with a chosen error.
    #[derive(Default)]
    struct FaultyStore {
        inner: InMemoryLedgerStore,
        conflicts: AtomicUsize,
        outages: AtomicUsize,
        append_calls: AtomicUsize,
    }

    impl LedgerStore for FaultyStore {
        fn load_latest(&self, product_id: ProductId) -> Result<Option<KardexRow>, LedgerStoreError> {
            self.inner.load_latest(product_id)
        }

        fn load_rows(
            &self,
            product_id: ProductId,
            after_sequence: u64,
            limit: usize,
        ) -> Result<Vec<KardexRow>, LedgerStoreError> {
            self.inner.load_rows(product_id, after_sequence, limit)
        }

        fn append_atomic(
            &self,
            append: LedgerAppend,
            expected: ExpectedSequence,
        ) -> Result<KardexRow, LedgerStoreError> {
            self.append_calls.fetch_add(1, Ordering::SeqCst);
            let take = |counter: &AtomicUsize| {
                counter
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            };
            if take(&self.outages) {
                return Err(LedgerStoreError::Unavailable("connection reset".to_string()));
            }
            if take(&self.conflicts) {
                return Err(LedgerStoreError::SequenceConflict {
                    expected: expected.value(),
                    found: expected.value() + 1,
                });
            }
            self.inner.append_atomic(append, expected)
        }

        fn load_movement_history(
            &self,
            product_id: ProductId,
        ) -> Result<Vec<LoggedMovement>, LedgerStoreError> {
            self.inner.load_movement_history(product_id)
        }

        fn replace_ledger(
            &self,
            product_id: ProductId,
            rows: Vec<KardexRow>,
            expected: ExpectedSequence,
        ) -> Result<(), LedgerStoreError> {
            self.inner.replace_ledger(product_id, rows, expected)
        }
    }

    struct Setup<S> {
        engine: Arc<KardexEngine<S, InMemoryCatalog>>,
        products: Vec<ProductId>,
        supplier_id: SupplierId,
        t0: DateTime<Utc>,
    }

    fn setup<S: LedgerStore>(store: S, products: usize, method: CostingMethod) -> Setup<S> {
        let catalog = InMemoryCatalog::new();
        let tenant_id = TenantId::new();
        let mut ids = Vec::with_capacity(products);
        for i in 0..products {
            let product = Product::create(
                ProductId::new(),
                NewProduct {
                    tenant_id,
                    title: format!("Item {i:04}"),
                    description: None,
                    unit_of_measurement: "unit".to_string(),
                    material_type: "steel".to_string(),
                },
                Utc::now(),
                None,
            )
            .unwrap();
            ids.push(*product.id());
            catalog.upsert_product(product);
        }
        let supplier = Supplier::register(
            SupplierId::new(),
            NewSupplier {
                name: "Aceros del Sur".to_string(),
                ..NewSupplier::default()
            },
            Utc::now(),
            None,
        )
        .unwrap();
        let supplier_id = *supplier.id();
        catalog.upsert_supplier(supplier);

        let mut config = KardexConfig::default();
        config.costing = CostingPolicy::uniform(method);
        config.engine.lock_timeout_ms = 10_000;
        Setup {
            engine: Arc::new(KardexEngine::new(store, catalog, config)),
            products: ids,
            supplier_id,
            t0: Utc::now(),
        }
    }

    fn usd(minor: i64) -> Money {
        Money::new(minor, Currency::USD)
    }

    #[test]
    fn hundred_concurrent_entries_produce_hundred_rows() {
        let s = setup(InMemoryLedgerStore::new(), 1, CostingMethod::WeightedAverage);
        let product_id = s.products[0];

        thread::scope(|scope| {
            for _ in 0..100 {
                let engine = &s.engine;
                scope.spawn(move || {
                    engine
                        .record_entry(product_id, s.supplier_id, 1, usd(150), s.t0, &RecordOptions::default())
                        .unwrap();
                });
            }
        });

        let snapshot = s.engine.current_stock(product_id).unwrap();
        assert_eq!(snapshot.stock, 100);
        assert_eq!(snapshot.sequence, 100);
        assert_eq!(snapshot.total_cost, Some(usd(15_000)));

        let rows = s.engine.store().load_rows(product_id, 0, 1_000).unwrap();
        let sequences: Vec<u64> = rows.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (1..=100).collect::<Vec<u64>>());
        for pair in rows.windows(2) {
            pair[1].check_invariants(Some(&pair[0])).unwrap();
        }
        assert!(s.engine.verify(product_id).unwrap().is_consistent());
    }

    #[test]
    fn concurrent_withdrawals_never_overdraw() {
        let s = setup(InMemoryLedgerStore::new(), 1, CostingMethod::Fifo);
        let product_id = s.products[0];
        s.engine
            .record_entry(product_id, s.supplier_id, 30, usd(100), s.t0, &RecordOptions::default())
            .unwrap();

        let rejected = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..50 {
                let (engine, rejected) = (&s.engine, &rejected);
                scope.spawn(move || {
                    match engine.record_withdrawal(product_id, 1, s.t0, &RecordOptions::default()) {
                        Ok(row) => assert!(row.stock >= 0),
                        Err(KardexError::InsufficientStock { .. }) => {
                            rejected.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                });
            }
        });

        assert_eq!(rejected.load(Ordering::SeqCst), 20);
        let snapshot = s.engine.current_stock(product_id).unwrap();
        assert_eq!(snapshot.stock, 0);
        assert_eq!(snapshot.sequence, 31);
    }

    #[test]
    fn distinct_products_proceed_while_one_is_held() {
        let s = setup(InMemoryLedgerStore::new(), 2, CostingMethod::WeightedAverage);
        let _held = s.engine.enter(s.products[0]).unwrap();

        let row = s
            .engine
            .record_entry(s.products[1], s.supplier_id, 5, usd(100), s.t0, &RecordOptions::default())
            .unwrap();
        assert_eq!(row.sequence, 1);
    }

    #[test]
    fn conflicts_are_retried_within_budget() {
        let store = FaultyStore::default();
        store.conflicts.store(3, Ordering::SeqCst);
        let s = setup(store, 1, CostingMethod::WeightedAverage);

        let row = s
            .engine
            .record_entry(s.products[0], s.supplier_id, 5, usd(100), s.t0, &RecordOptions::default())
            .unwrap();
        assert_eq!(row.sequence, 1);
        assert_eq!(s.engine.store().append_calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn conflicts_beyond_budget_surface() {
        let store = FaultyStore::default();
        store.conflicts.store(10, Ordering::SeqCst);
        let s = setup(store, 1, CostingMethod::WeightedAverage);

        let err = s
            .engine
            .record_entry(s.products[0], s.supplier_id, 5, usd(100), s.t0, &RecordOptions::default())
            .unwrap_err();
        assert_eq!(err, KardexError::SequenceConflict { attempts: 4 });
        assert!(err.is_retryable());
        assert_eq!(s.engine.current_stock(s.products[0]).unwrap().sequence, 0);
    }

    #[test]
    fn store_outage_surfaces_without_retry() {
        let store = FaultyStore::default();
        store.outages.store(1, Ordering::SeqCst);
        let s = setup(store, 1, CostingMethod::WeightedAverage);

        let err = s
            .engine
            .record_entry(s.products[0], s.supplier_id, 5, usd(100), s.t0, &RecordOptions::default())
            .unwrap_err();
        assert!(matches!(err, KardexError::StoreUnavailable(_)));
        assert!(!err.is_retryable());
        assert_eq!(s.engine.store().append_calls.load(Ordering::SeqCst), 1);
        assert!(s.engine.store().load_movement_history(s.products[0]).unwrap().is_empty());

        // The outage was transient; the next call goes through.
        s.engine
            .record_entry(s.products[0], s.supplier_id, 5, usd(100), s.t0, &RecordOptions::default())
            .unwrap();
    }

    #[test]
    fn history_reflects_rejections_and_date_range() {
        let s = setup(InMemoryLedgerStore::new(), 1, CostingMethod::WeightedAverage);
        let product_id = s.products[0];
        let opts = RecordOptions::default();

        s.engine
            .record_entry(product_id, s.supplier_id, 10, usd(500), s.t0, &opts)
            .unwrap();
        s.engine
            .record_entry(product_id, s.supplier_id, 10, usd(700), s.t0 + Duration::days(1), &opts)
            .unwrap();
        assert!(matches!(
            s.engine.record_withdrawal(product_id, 25, s.t0 + Duration::days(2), &opts),
            Err(KardexError::InsufficientStock { requested: 25, available: 20 })
        ));
        assert!(matches!(
            s.engine
                .record_entry(product_id, s.supplier_id, 1, usd(100), s.t0, &opts),
            Err(KardexError::BackdatedMovement { .. })
        ));
        s.engine
            .record_withdrawal(product_id, 5, s.t0 + Duration::days(3), &opts)
            .unwrap();

        let history = s
            .engine
            .history(product_id, s.t0 + Duration::days(1), s.t0 + Duration::days(10));
        let rows: Vec<KardexRow> = history.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].unit_cost.to_money().unwrap(), usd(600));
        assert_eq!(rows[1].stock, 15);
        assert_eq!(rows[1].movement.unit_cost.to_money().unwrap(), usd(600));
        assert_eq!(rows[1].total_cost, usd(9_000));
    }
}
