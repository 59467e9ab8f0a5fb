use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use pharmacy_core::{BatchId, EntryId, ExpectedVersion, LocationId, ProductId, StockItemId};
use pharmacy_inventory::{ExpirationBatch, LedgerEntry, NewBatch, NewLedgerEntry, StockItem};

use super::r#trait::{LedgerStore, LedgerTx, StoreError};

#[derive(Debug, Default, Clone)]
pub(crate) struct LedgerState {
    pub(crate) stock_items: HashMap<StockItemId, StockItem>,
    by_key: HashMap<(ProductId, LocationId), StockItemId>,
    pub(crate) batches: HashMap<BatchId, ExpirationBatch>,
    /// Append-only; position `i` holds sequence `i + 1`.
    pub(crate) entries: Vec<LedgerEntry>,
    next_batch_sequence: u64,
}

impl LedgerState {
    /// Batches of one stock item in FIFO order.
    pub(crate) fn batches_of(&self, stock_item_id: StockItemId) -> Vec<ExpirationBatch> {
        let mut batches: Vec<ExpirationBatch> = self
            .batches
            .values()
            .filter(|b| b.stock_item_id == stock_item_id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.fifo_key());
        batches
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Transactions are serialized behind one async mutex
/// and work on a copy of the state that replaces the shared state on commit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn snapshot(&self) -> tokio::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().await
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryLedgerTx { guard, working }))
    }
}

struct InMemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait::async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn find_stock_item(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError> {
        Ok(self
            .working
            .by_key
            .get(&(product_id, location_id))
            .and_then(|id| self.working.stock_items.get(id))
            .cloned())
    }

    async fn get_stock_item(&mut self, id: StockItemId) -> Result<Option<StockItem>, StoreError> {
        Ok(self.working.stock_items.get(&id).cloned())
    }

    async fn insert_stock_item(&mut self, item: StockItem) -> Result<StockItem, StoreError> {
        let key = (item.product_id, item.location_id);
        if let Some(existing) = self.working.by_key.get(&key) {
            return self
                .working
                .stock_items
                .get(existing)
                .cloned()
                .ok_or_else(|| StoreError::Backend(format!("dangling stock index for {existing}")));
        }
        self.working.by_key.insert(key, item.id);
        self.working.stock_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_stock_item(
        &mut self,
        item: &StockItem,
        expected: ExpectedVersion,
    ) -> Result<StockItem, StoreError> {
        let stored = self
            .working
            .stock_items
            .get_mut(&item.id)
            .ok_or_else(|| StoreError::NotFound(format!("stock item {}", item.id)))?;

        if !expected.matches(stored.version) {
            return Err(StoreError::Conflict(format!(
                "stock item {}: expected {expected:?}, found {}",
                item.id, stored.version
            )));
        }

        stored.quantity = item.quantity;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn insert_batch(&mut self, batch: NewBatch) -> Result<ExpirationBatch, StoreError> {
        self.working.next_batch_sequence += 1;
        let created = ExpirationBatch {
            id: BatchId::new(),
            stock_item_id: batch.stock_item_id,
            expiry_date: batch.expiry_date,
            received_quantity: batch.quantity,
            remaining: batch.quantity,
            sequence: self.working.next_batch_sequence,
            received_at: batch.received_at,
        };
        self.working.batches.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_batch(&mut self, id: BatchId) -> Result<Option<ExpirationBatch>, StoreError> {
        Ok(self.working.batches.get(&id).cloned())
    }

    async fn open_batches(
        &mut self,
        stock_item_id: StockItemId,
    ) -> Result<Vec<ExpirationBatch>, StoreError> {
        let mut open = self.working.batches_of(stock_item_id);
        open.retain(|b| b.is_open());
        Ok(open)
    }

    async fn update_batch_remaining(&mut self, id: BatchId, remaining: i64) -> Result<(), StoreError> {
        if remaining < 0 {
            return Err(StoreError::Backend(format!(
                "batch {id} remaining cannot be negative ({remaining})"
            )));
        }
        let batch = self
            .working
            .batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("batch {id}")))?;
        batch.remaining = remaining;
        Ok(())
    }

    async fn append_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let sequence = self.working.entries.len() as u64 + 1;
        let committed = entry.commit(EntryId::new(), sequence);
        self.working.entries.push(committed.clone());
        Ok(committed)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryLedgerTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pharmacy_core::DocumentId;
    use pharmacy_inventory::DocumentRef;

    #[tokio::test]
    async fn uncommitted_writes_are_discarded() {
        let store = InMemoryLedgerStore::new();
        let item = StockItem::new(ProductId::new(), LocationId::new(), Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_stock_item(item.clone()).await.unwrap();
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_stock_item(item.id).await.unwrap().is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let store = InMemoryLedgerStore::new();
        let mut item = StockItem::new(ProductId::new(), LocationId::new(), Utc::now());

        let mut tx = store.begin().await.unwrap();
        tx.insert_stock_item(item.clone()).await.unwrap();
        item.quantity = 5;
        let updated = tx.update_stock_item(&item, ExpectedVersion::Exact(0)).await.unwrap();
        assert_eq!(updated.version, 1);

        let err = tx.update_stock_item(&item, ExpectedVersion::Exact(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_stock_item_returns_the_existing_row() {
        let store = InMemoryLedgerStore::new();
        let (product, location) = (ProductId::new(), LocationId::new());
        let first = StockItem::new(product, location, Utc::now());
        let second = StockItem::new(product, location, Utc::now());

        let mut tx = store.begin().await.unwrap();
        let a = tx.insert_stock_item(first).await.unwrap();
        let b = tx.insert_stock_item(second).await.unwrap();
        assert_eq!(a.id, b.id);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn batches_and_entries_get_increasing_sequences() {
        let store = InMemoryLedgerStore::new();
        let stock_item_id = StockItemId::new();
        let expiry = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut sequences = Vec::new();
        for _ in 0..3 {
            let batch = tx
                .insert_batch(NewBatch {
                    stock_item_id,
                    expiry_date: expiry,
                    quantity: 4,
                    received_at: Utc::now(),
                })
                .await
                .unwrap();
            sequences.push(batch.sequence);
        }
        assert_eq!(sequences, vec![1, 2, 3]);

        let entry = NewLedgerEntry::receipt(
            stock_item_id,
            4,
            LocationId::new(),
            LocationId::new(),
            DocumentRef::purchase_order_item(DocumentId::new()),
            Some(expiry),
            Utc::now(),
        );
        let first = tx.append_entry(entry.clone()).await.unwrap();
        let second = tx.append_entry(entry).await.unwrap();
        assert_eq!((first.sequence, second.sequence), (1, 2));
        tx.commit().await.unwrap();
    }
}
