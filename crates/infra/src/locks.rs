//! Per-product exclusive sections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use kardex_core::ProductId;

/// Guard for one product's critical section; released on drop.
pub type ProductGuard = ArcMutexGuard<RawMutex, ()>;

/// Registry of one mutex per product.
///
/// Distinct products only meet on the registry map, held for the lookup
/// alone; waiting happens on the product's own mutex.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<ProductId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, product_id: ProductId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(product_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Enter the product's section, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout.
    pub fn acquire(&self, product_id: ProductId, timeout: Duration) -> Option<ProductGuard> {
        Mutex::try_lock_arc_for(&self.lock_for(product_id), timeout)
    }
}
