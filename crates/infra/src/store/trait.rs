use thiserror::Error;

use pharmacy_core::{BatchId, ExpectedVersion, LocationId, ProductId, StockItemId};
use pharmacy_inventory::{ExpirationBatch, LedgerEntry, NewBatch, NewLedgerEntry, StockItem};

/// Persistence error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, quantity rules).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stock row changed under us (optimistic version check or unique race).
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// A row the transaction expected to exist is gone.
    #[error("row not found: {0}")]
    NotFound(String),

    /// A stored row could not be decoded into a domain value.
    #[error("failed to decode row: {0}")]
    Decode(String),

    /// The backend failed (connection, constraint, poisoned state, ...).
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// One unit of work against the ledger tables.
///
/// Reads of stock items and batches lock the rows (where the backend supports
/// it) until the transaction ends. Nothing written through a transaction is
/// visible to others before `commit`; dropping a transaction without
/// committing discards its writes.
#[async_trait::async_trait]
pub trait LedgerTx: Send {
    async fn find_stock_item(
        &mut self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError>;

    async fn get_stock_item(&mut self, id: StockItemId) -> Result<Option<StockItem>, StoreError>;

    /// Insert a fresh stock row, or return the row that already exists for
    /// the same (product, location).
    async fn insert_stock_item(&mut self, item: StockItem) -> Result<StockItem, StoreError>;

    /// Write back quantity, bumping the row version.
    ///
    /// Fails with `Conflict` when the stored version does not match `expected`.
    async fn update_stock_item(
        &mut self,
        item: &StockItem,
        expected: ExpectedVersion,
    ) -> Result<StockItem, StoreError>;

    /// Create a batch; the store assigns its id and creation sequence.
    async fn insert_batch(&mut self, batch: NewBatch) -> Result<ExpirationBatch, StoreError>;

    async fn get_batch(&mut self, id: BatchId) -> Result<Option<ExpirationBatch>, StoreError>;

    /// Batches of a stock item with remaining > 0, in FIFO order.
    async fn open_batches(
        &mut self,
        stock_item_id: StockItemId,
    ) -> Result<Vec<ExpirationBatch>, StoreError>;

    async fn update_batch_remaining(&mut self, id: BatchId, remaining: i64) -> Result<(), StoreError>;

    /// Append an entry; the store assigns its id and ledger sequence.
    async fn append_entry(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Source of ledger transactions.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for std::sync::Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        (**self).begin().await
    }
}
