//! Read-only queries over stock, batches and the movement ledger.
//!
//! Queries never lock rows and never go through a ledger transaction; they see
//! the last committed state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{LocationId, ProductId, StockItemId};
use pharmacy_inventory::{BatchBalance, ExpirationBatch, LedgerEntry, MovementType, StockItem};

use crate::store::{InMemoryLedgerStore, StoreError};

/// Largest page a ledger history query returns.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Pagination parameters for ledger history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
    }

    /// Same page with `limit` clamped to [`MAX_PAGE_SIZE`]; applied by every
    /// `LedgerQuery::entries` implementation.
    pub fn capped(self) -> Self {
        Self {
            limit: self.limit.min(MAX_PAGE_SIZE),
            ..self
        }
    }
}

/// Filter criteria for ledger history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub stock_item_id: Option<StockItemId>,
    pub movement: Option<MovementType>,
    /// Matches entries whose source OR destination is this location.
    pub location_id: Option<LocationId>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.stock_item_id.is_none_or(|id| entry.stock_item_id == id)
            && self.movement.is_none_or(|m| entry.movement == m)
            && self.location_id.is_none_or(|l| entry.touches_location(l))
            && self.occurred_after.is_none_or(|t| entry.occurred_at >= t)
            && self.occurred_before.is_none_or(|t| entry.occurred_at <= t)
    }
}

/// Paginated ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerQueryResult {
    /// Entries on this page, newest first.
    pub entries: Vec<LedgerEntry>,
    /// Entries matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl LedgerQueryResult {
    pub fn new(entries: Vec<LedgerEntry>, total: u64, pagination: Pagination) -> Self {
        let has_more = total > pagination.offset as u64 + pagination.limit as u64;
        Self {
            entries,
            total,
            pagination,
            has_more,
        }
    }
}

#[async_trait::async_trait]
pub trait LedgerQuery: Send + Sync {
    async fn stock_item(&self, id: StockItemId) -> Result<Option<StockItem>, StoreError>;

    async fn find_stock_item(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError>;

    /// Stock items holding fewer than `threshold` units, lowest first.
    async fn low_stock(
        &self,
        threshold: i64,
        location_id: Option<LocationId>,
    ) -> Result<Vec<StockItem>, StoreError>;

    /// Open batches expiring on or before `on_or_before`, in FIFO order.
    async fn expiring_batches(
        &self,
        on_or_before: NaiveDate,
        location_id: Option<LocationId>,
    ) -> Result<Vec<ExpirationBatch>, StoreError>;

    /// Every batch of one stock item (including emptied ones), in FIFO order.
    async fn batches(&self, stock_item_id: StockItemId) -> Result<Vec<ExpirationBatch>, StoreError>;

    /// Ledger history, newest first.
    async fn entries(
        &self,
        filter: LedgerFilter,
        pagination: Pagination,
    ) -> Result<LedgerQueryResult, StoreError>;

    async fn batch_balance(&self, stock_item_id: StockItemId) -> Result<Option<BatchBalance>, StoreError>;
}

#[async_trait::async_trait]
impl LedgerQuery for InMemoryLedgerStore {
    async fn stock_item(&self, id: StockItemId) -> Result<Option<StockItem>, StoreError> {
        Ok(self.snapshot().await.stock_items.get(&id).cloned())
    }

    async fn find_stock_item(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> Result<Option<StockItem>, StoreError> {
        Ok(self
            .snapshot()
            .await
            .stock_items
            .values()
            .find(|s| s.product_id == product_id && s.location_id == location_id)
            .cloned())
    }

    async fn low_stock(
        &self,
        threshold: i64,
        location_id: Option<LocationId>,
    ) -> Result<Vec<StockItem>, StoreError> {
        let state = self.snapshot().await;
        let mut low: Vec<StockItem> = state
            .stock_items
            .values()
            .filter(|s| s.quantity < threshold)
            .filter(|s| location_id.is_none_or(|l| s.location_id == l))
            .cloned()
            .collect();
        low.sort_by_key(|s| (s.quantity, s.id));
        Ok(low)
    }

    async fn expiring_batches(
        &self,
        on_or_before: NaiveDate,
        location_id: Option<LocationId>,
    ) -> Result<Vec<ExpirationBatch>, StoreError> {
        let state = self.snapshot().await;
        let mut expiring: Vec<ExpirationBatch> = state
            .batches
            .values()
            .filter(|b| b.is_open() && b.is_expired_on(on_or_before))
            .filter(|b| {
                location_id.is_none_or(|l| {
                    state
                        .stock_items
                        .get(&b.stock_item_id)
                        .is_some_and(|s| s.location_id == l)
                })
            })
            .cloned()
            .collect();
        expiring.sort_by_key(|b| b.fifo_key());
        Ok(expiring)
    }

    async fn batches(&self, stock_item_id: StockItemId) -> Result<Vec<ExpirationBatch>, StoreError> {
        Ok(self.snapshot().await.batches_of(stock_item_id))
    }

    async fn entries(
        &self,
        filter: LedgerFilter,
        pagination: Pagination,
    ) -> Result<LedgerQueryResult, StoreError> {
        let pagination = pagination.capped();
        let state = self.snapshot().await;
        let mut matching: Vec<&LedgerEntry> =
            state.entries.iter().filter(|e| filter.matches(e)).collect();
        matching.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(b.sequence.cmp(&a.sequence))
        });

        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();

        Ok(LedgerQueryResult::new(entries, total, pagination))
    }

    async fn batch_balance(&self, stock_item_id: StockItemId) -> Result<Option<BatchBalance>, StoreError> {
        let state = self.snapshot().await;
        Ok(state
            .stock_items
            .get(&stock_item_id)
            .map(|item| BatchBalance::compute(item, &state.batches_of(stock_item_id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmacy_core::{DocumentId, EntryId};
    use pharmacy_inventory::NewLedgerEntry;

    #[test]
    fn pagination_is_capped() {
        assert_eq!(Pagination::new(Some(5_000), None).limit, 1000);
        assert_eq!(Pagination::new(None, Some(20)), Pagination { limit: 50, offset: 20 });

        let literal = Pagination { limit: 100_000, offset: 3 };
        assert_eq!(literal.capped(), Pagination { limit: MAX_PAGE_SIZE, offset: 3 });
    }

    #[tokio::test]
    async fn oversized_page_is_clamped_by_the_store() {
        let store = InMemoryLedgerStore::new();
        let result = store
            .entries(LedgerFilter::default(), Pagination { limit: 100_000, offset: 0 })
            .await
            .unwrap();
        assert_eq!(result.pagination.limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn has_more_accounts_for_offset() {
        let page = Pagination { limit: 10, offset: 10 };
        assert!(LedgerQueryResult::new(vec![], 21, page).has_more);
        assert!(!LedgerQueryResult::new(vec![], 20, page).has_more);
    }

    #[test]
    fn location_filter_matches_source_or_destination() {
        let (a, b) = (LocationId::new(), LocationId::new());
        let entry = NewLedgerEntry::transfer(StockItemId::new(), 3, a, b, DocumentId::new(), Utc::now())
            .commit(EntryId::new(), 1);

        let from_a = LedgerFilter { location_id: Some(a), ..Default::default() };
        let to_b = LedgerFilter { location_id: Some(b), ..Default::default() };
        let elsewhere = LedgerFilter { location_id: Some(LocationId::new()), ..Default::default() };
        let sales = LedgerFilter { movement: Some(MovementType::Sale), ..Default::default() };

        assert!(from_a.matches(&entry));
        assert!(to_b.matches(&entry));
        assert!(!elsewhere.matches(&entry));
        assert!(!sales.matches(&entry));
    }

    #[test]
    fn filter_round_trips_through_json() {
        let filter = LedgerFilter {
            movement: Some(MovementType::Disposal),
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["movement"], "disposal");
        let back: LedgerFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, filter);
    }
}
