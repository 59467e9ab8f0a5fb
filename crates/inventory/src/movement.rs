//! Typed movement requests and their outcomes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{
    BatchId, DocumentId, DomainError, DomainResult, LocationId, ProductId, StockItemId,
};

use crate::batch::ExpirationBatch;
use crate::fifo::BatchDraw;
use crate::ledger::{DocumentKind, DocumentRef, LedgerEntry};
use crate::stock::{StockItem, ensure_positive};

/// Request: receive stock into a location (PO receipt or transfer-in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub product_id: ProductId,
    pub destination: LocationId,
    pub quantity: i64,
    /// When present, a new expiration batch is opened for the received units.
    pub expiry_date: Option<NaiveDate>,
    pub document: DocumentRef,
    /// Originating location; defaults to the supplier pseudo-location.
    pub source: Option<LocationId>,
}

impl ReceiveRequest {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)?;
        match self.document.kind {
            DocumentKind::PurchaseOrderItem | DocumentKind::TransferItem => {}
            other => {
                return Err(DomainError::validation(format!(
                    "receipts must reference a purchase-order or transfer item, not {}",
                    other.as_str()
                )));
            }
        }
        if self.source == Some(self.destination) {
            return Err(DomainError::validation("receipt source and destination are the same location"));
        }
        Ok(())
    }
}

/// Request: sell one sale line from a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellRequest {
    pub product_id: ProductId,
    pub origin: LocationId,
    pub quantity: i64,
    pub sale_line: DocumentId,
}

impl SellRequest {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)
    }
}

/// Request: move one transfer line between locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: ProductId,
    pub source: LocationId,
    pub destination: LocationId,
    pub quantity: i64,
    pub transfer_line: DocumentId,
}

impl TransferRequest {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)?;
        if self.source == self.destination {
            return Err(DomainError::validation("transfer source and destination must differ"));
        }
        Ok(())
    }
}

/// Request: write off part of one expiration batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposeRequest {
    pub stock_item_id: StockItemId,
    pub batch_id: BatchId,
    pub quantity: i64,
    /// Recorded as the entry's timestamp.
    pub disposed_at: DateTime<Utc>,
    pub disposal_id: DocumentId,
}

impl DisposeRequest {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive(self.quantity)
    }
}

/// Request: overwrite on-hand with a physical count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub stock_item_id: StockItemId,
    pub counted_quantity: i64,
    pub count_id: DocumentId,
    pub reason: Option<String>,
}

impl AdjustRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.counted_quantity < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        Ok(())
    }
}

/// Check a disposal against both the stock row and the named batch.
///
/// Runs before any mutation; the only place double-spend is refused outright.
pub fn check_disposal(item: &StockItem, batch: &ExpirationBatch, quantity: i64) -> DomainResult<()> {
    ensure_positive(quantity)?;
    if batch.stock_item_id != item.id {
        return Err(DomainError::validation(format!(
            "batch {} does not belong to stock item {}",
            batch.id, item.id
        )));
    }
    if quantity > item.quantity || quantity > batch.remaining {
        return Err(DomainError::ExcessiveDisposalQuantity {
            requested: quantity,
            on_hand: item.quantity,
            batch_remaining: batch.remaining,
        });
    }
    Ok(())
}

/// Result of a sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleAllocation {
    pub stock_item: StockItem,
    /// Total-quantity entry for the full demand.
    pub gross_entry: LedgerEntry,
    pub draws: Vec<BatchDraw>,
    /// One entry per draw, in FIFO order.
    pub batch_entries: Vec<LedgerEntry>,
    /// Demand not covered by expiry-tracked batches.
    pub shortfall: i64,
}

impl SaleAllocation {
    pub fn lines_allocated(&self) -> usize {
        self.draws.len()
    }
}

/// Result of a transfer line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub source: StockItem,
    pub destination: StockItem,
    pub deducted: i64,
    pub added: i64,
    pub entry: LedgerEntry,
}

impl TransferOutcome {
    /// Quantity created (lenient transfers) beyond what left the source.
    pub fn unbacked(&self) -> i64 {
        self.added - self.deducted
    }
}

/// Result of a stock count adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustOutcome {
    pub stock_item: StockItem,
    /// `None` when the count matched the recorded quantity.
    pub entry: Option<LedgerEntry>,
}
