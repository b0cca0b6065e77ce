//! Lazy, restartable reads over a product's committed kardex rows.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use kardex_core::ProductId;
use kardex_inventory::KardexRow;

use crate::ledger_store::{LedgerStore, LedgerStoreError};

/// Rows of one product dated within `[from, to]`.
///
/// Nothing is read until iteration starts. Every call to [`iter`] starts a
/// fresh pass from the first row, fetching `page_size` rows per store read;
/// dropping the iterator early stops the reads.
///
/// [`iter`]: KardexHistory::iter
#[derive(Debug)]
pub struct KardexHistory<'a, S> {
    store: &'a S,
    product_id: ProductId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    page_size: usize,
}

impl<'a, S: LedgerStore> KardexHistory<'a, S> {
    pub(crate) fn new(
        store: &'a S,
        product_id: ProductId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            product_id,
            from,
            to,
            page_size: page_size.max(1),
        }
    }

    pub fn iter(&self) -> HistoryIter<'a, S> {
        HistoryIter {
            store: self.store,
            product_id: self.product_id,
            from: self.from,
            to: self.to,
            page_size: self.page_size,
            cursor: 0,
            buffer: VecDeque::new(),
            done: self.from > self.to,
        }
    }
}

impl<'a, S: LedgerStore> IntoIterator for &KardexHistory<'a, S> {
    type Item = Result<KardexRow, LedgerStoreError>;
    type IntoIter = HistoryIter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`KardexHistory`].
#[derive(Debug)]
pub struct HistoryIter<'a, S> {
    store: &'a S,
    product_id: ProductId,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    page_size: usize,
    /// Last sequence fetched from the store.
    cursor: u64,
    buffer: VecDeque<KardexRow>,
    done: bool,
}

impl<S: LedgerStore> Iterator for HistoryIter<'_, S> {
    type Item = Result<KardexRow, LedgerStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.buffer.is_empty() {
                match self.store.load_rows(self.product_id, self.cursor, self.page_size) {
                    Ok(page) if page.is_empty() => {
                        self.done = true;
                        return None;
                    }
                    Ok(page) => {
                        self.cursor = page.last().map_or(self.cursor, |r| r.sequence);
                        self.buffer.extend(page);
                    }
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }

            let row = self.buffer.pop_front()?;
            // Rows are never backdated, so dates are non-decreasing.
            if row.occurred_at > self.to {
                self.done = true;
                return None;
            }
            if row.occurred_at >= self.from {
                return Some(Ok(row));
            }
        }
    }
}
