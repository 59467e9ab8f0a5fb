use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{BatchId, DomainError, DomainResult, StockItemId};

use crate::stock::{StockItem, ensure_positive};

/// Quantity of one stock item tied to one expiry date and one receiving event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationBatch {
    pub id: BatchId,
    pub stock_item_id: StockItemId,
    pub expiry_date: NaiveDate,
    /// Quantity at creation (traceability back to the receipt).
    pub received_quantity: i64,
    pub remaining: i64,
    /// Store-assigned creation order; breaks ties between equal expiry dates.
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
}

impl ExpirationBatch {
    /// FIFO ordering key: earliest expiry first, then earliest created.
    pub fn fifo_key(&self) -> (NaiveDate, u64) {
        (self.expiry_date, self.sequence)
    }

    pub fn is_open(&self) -> bool {
        self.remaining > 0
    }

    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiry_date <= date
    }

    pub fn draw(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        if quantity > self.remaining {
            return Err(DomainError::invariant(format!(
                "batch {} holds {} but {} was drawn",
                self.id, self.remaining, quantity
            )));
        }
        self.remaining -= quantity;
        Ok(())
    }
}

/// A batch to be created by a receipt (the store assigns id and sequence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    pub stock_item_id: StockItemId,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    pub received_at: DateTime<Utc>,
}

/// On-hand versus expiry-tracked quantity for one stock item.
///
/// `untracked` is zero whenever every received unit carried an expiry date
/// and nothing bypassed batch tracking (adjustments, lenient transfers,
/// oversells).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchBalance {
    pub stock_item_id: StockItemId,
    pub on_hand: i64,
    pub tracked: i64,
}

impl BatchBalance {
    pub fn compute(item: &StockItem, batches: &[ExpirationBatch]) -> Self {
        let tracked = batches
            .iter()
            .filter(|b| b.stock_item_id == item.id)
            .map(|b| b.remaining)
            .sum();
        Self {
            stock_item_id: item.id,
            on_hand: item.quantity,
            tracked,
        }
    }

    pub fn untracked(&self) -> i64 {
        self.on_hand - self.tracked
    }

    pub fn is_balanced(&self) -> bool {
        self.untracked() == 0
    }
}
