//! Append-only movement ledger records.
//!
//! Every quantity change is written once as a ledger entry and never mutated
//! or deleted; the ledger is the only way to reconstruct stock history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{DocumentId, DomainError, EntryId, LocationId, StockItemId};

/// Kind of movement recorded by a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Receive,
    Sale,
    Transfer,
    Disposal,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Receive => "receive",
            MovementType::Sale => "sale",
            MovementType::Transfer => "transfer",
            MovementType::Disposal => "disposal",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receive" => Ok(MovementType::Receive),
            "sale" => Ok(MovementType::Sale),
            "transfer" => Ok(MovementType::Transfer),
            "disposal" => Ok(MovementType::Disposal),
            "adjustment" => Ok(MovementType::Adjustment),
            other => Err(DomainError::validation(format!("unknown movement type '{other}'"))),
        }
    }
}

/// Kind of external document a movement is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    PurchaseOrderItem,
    SaleItem,
    TransferItem,
    Disposal,
    StockCount,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrderItem => "purchase_order_item",
            DocumentKind::SaleItem => "sale_item",
            DocumentKind::TransferItem => "transfer_item",
            DocumentKind::Disposal => "disposal",
            DocumentKind::StockCount => "stock_count",
        }
    }
}

impl core::str::FromStr for DocumentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_order_item" => Ok(DocumentKind::PurchaseOrderItem),
            "sale_item" => Ok(DocumentKind::SaleItem),
            "transfer_item" => Ok(DocumentKind::TransferItem),
            "disposal" => Ok(DocumentKind::Disposal),
            "stock_count" => Ok(DocumentKind::StockCount),
            other => Err(DomainError::validation(format!("unknown document kind '{other}'"))),
        }
    }
}

/// Typed link from a ledger entry to the document line that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub id: DocumentId,
}

impl DocumentRef {
    pub fn purchase_order_item(id: DocumentId) -> Self {
        Self { kind: DocumentKind::PurchaseOrderItem, id }
    }

    pub fn sale_item(id: DocumentId) -> Self {
        Self { kind: DocumentKind::SaleItem, id }
    }

    pub fn transfer_item(id: DocumentId) -> Self {
        Self { kind: DocumentKind::TransferItem, id }
    }

    pub fn disposal(id: DocumentId) -> Self {
        Self { kind: DocumentKind::Disposal, id }
    }

    pub fn stock_count(id: DocumentId) -> Self {
        Self { kind: DocumentKind::StockCount, id }
    }
}

/// A ledger entry ready to be appended (the store assigns id and sequence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub stock_item_id: StockItemId,
    pub movement: MovementType,
    pub quantity_change: i64,
    pub source_location: LocationId,
    pub destination_location: Option<LocationId>,
    pub document: DocumentRef,
    pub expiry_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

impl NewLedgerEntry {
    pub fn receipt(
        stock_item_id: StockItemId,
        quantity: i64,
        source: LocationId,
        destination: LocationId,
        document: DocumentRef,
        expiry_date: Option<NaiveDate>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stock_item_id,
            movement: MovementType::Receive,
            quantity_change: quantity,
            source_location: source,
            destination_location: Some(destination),
            document,
            expiry_date,
            occurred_at,
        }
    }

    /// Total-quantity record of a sale line, independent of batch tracking.
    pub fn sale_gross(
        stock_item_id: StockItemId,
        quantity: i64,
        origin: LocationId,
        sale_line: DocumentId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stock_item_id,
            movement: MovementType::Sale,
            quantity_change: -quantity,
            source_location: origin,
            destination_location: None,
            document: DocumentRef::sale_item(sale_line),
            expiry_date: None,
            occurred_at,
        }
    }

    /// Per-batch record of a sale line, scoped to the batch's expiry date.
    pub fn sale_batch(
        stock_item_id: StockItemId,
        quantity: i64,
        origin: LocationId,
        sale_line: DocumentId,
        expiry_date: NaiveDate,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            expiry_date: Some(expiry_date),
            ..Self::sale_gross(stock_item_id, quantity, origin, sale_line, occurred_at)
        }
    }

    pub fn transfer(
        destination_item: StockItemId,
        quantity: i64,
        source: LocationId,
        destination: LocationId,
        transfer_line: DocumentId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stock_item_id: destination_item,
            movement: MovementType::Transfer,
            quantity_change: quantity,
            source_location: source,
            destination_location: Some(destination),
            document: DocumentRef::transfer_item(transfer_line),
            expiry_date: None,
            occurred_at,
        }
    }

    pub fn disposal(
        stock_item_id: StockItemId,
        quantity: i64,
        location: LocationId,
        disposal_id: DocumentId,
        expiry_date: NaiveDate,
        disposed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stock_item_id,
            movement: MovementType::Disposal,
            quantity_change: -quantity,
            source_location: location,
            destination_location: None,
            document: DocumentRef::disposal(disposal_id),
            expiry_date: Some(expiry_date),
            occurred_at: disposed_at,
        }
    }

    pub fn adjustment(
        stock_item_id: StockItemId,
        delta: i64,
        location: LocationId,
        count_id: DocumentId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stock_item_id,
            movement: MovementType::Adjustment,
            quantity_change: delta,
            source_location: location,
            destination_location: None,
            document: DocumentRef::stock_count(count_id),
            expiry_date: None,
            occurred_at,
        }
    }

    /// Materialize as a committed entry with store-assigned identity.
    pub fn commit(self, id: EntryId, sequence: u64) -> LedgerEntry {
        LedgerEntry {
            id,
            sequence,
            stock_item_id: self.stock_item_id,
            movement: self.movement,
            quantity_change: self.quantity_change,
            source_location: self.source_location,
            destination_location: self.destination_location,
            document: self.document,
            expiry_date: self.expiry_date,
            occurred_at: self.occurred_at,
        }
    }
}

/// A committed, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    /// Monotonically increasing position in the ledger.
    pub sequence: u64,
    pub stock_item_id: StockItemId,
    pub movement: MovementType,
    pub quantity_change: i64,
    pub source_location: LocationId,
    pub destination_location: Option<LocationId>,
    pub document: DocumentRef,
    pub expiry_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Entries that record a batch-level draw rather than a gross movement.
    pub fn is_batch_scoped(&self) -> bool {
        self.movement == MovementType::Sale && self.expiry_date.is_some()
    }

    pub fn touches_location(&self, location: LocationId) -> bool {
        self.source_location == location || self.destination_location == Some(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_type_parses_its_own_label() {
        for m in [
            MovementType::Receive,
            MovementType::Sale,
            MovementType::Transfer,
            MovementType::Disposal,
            MovementType::Adjustment,
        ] {
            assert_eq!(m.as_str().parse::<MovementType>().unwrap(), m);
        }
        assert!("pos".parse::<MovementType>().is_err());
    }

    #[test]
    fn sale_entries_are_negative_and_have_no_destination() {
        let origin = LocationId::new();
        let gross = NewLedgerEntry::sale_gross(StockItemId::new(), 12, origin, DocumentId::new(), Utc::now());
        assert_eq!(gross.quantity_change, -12);
        assert_eq!(gross.destination_location, None);
        assert_eq!(gross.expiry_date, None);
        assert_eq!(gross.document.kind, DocumentKind::SaleItem);

        let expiry = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let batch = NewLedgerEntry::sale_batch(
            gross.stock_item_id,
            5,
            origin,
            gross.document.id,
            expiry,
            gross.occurred_at,
        )
        .commit(EntryId::new(), 2);
        assert!(batch.is_batch_scoped());
        assert_eq!(batch.quantity_change, -5);
    }

    #[test]
    fn transfer_entry_touches_both_locations() {
        let (a, b) = (LocationId::new(), LocationId::new());
        let entry = NewLedgerEntry::transfer(StockItemId::new(), 4, a, b, DocumentId::new(), Utc::now())
            .commit(EntryId::new(), 1);
        assert!(entry.touches_location(a));
        assert!(entry.touches_location(b));
        assert!(!entry.touches_location(LocationId::new()));
        assert_eq!(entry.quantity_change, 4);
    }

    #[test]
    fn document_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentKind::PurchaseOrderItem).unwrap();
        assert_eq!(json, "\"purchase_order_item\"");
    }
}
