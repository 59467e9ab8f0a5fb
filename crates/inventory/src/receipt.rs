//! Purchase-order line receipts.
//!
//! Receiving staff account for every ordered unit as received, expired on
//! arrival or damaged. Stock is only posted once the line is fully accounted
//! for; expired and damaged units never enter stock.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pharmacy_core::{DocumentId, DomainError, DomainResult, LocationId, ProductId};

use crate::ledger::DocumentRef;
use crate::movement::ReceiveRequest;
use crate::stock::StockItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLineReceipt {
    pub purchase_order_item: DocumentId,
    pub product_id: ProductId,
    pub destination: LocationId,
    pub ordered: i64,
    pub received: i64,
    pub expired: i64,
    pub damaged: i64,
    pub expiry_date: Option<NaiveDate>,
    pub source: Option<LocationId>,
}

impl PurchaseLineReceipt {
    pub fn accounted(&self) -> i64 {
        self.received + self.expired + self.damaged
    }

    pub fn rejected(&self) -> i64 {
        self.expired + self.damaged
    }

    pub fn reconcile(&self) -> DomainResult<()> {
        if self.ordered <= 0 {
            return Err(DomainError::validation("ordered quantity must be positive"));
        }
        if self.received < 0 || self.expired < 0 || self.damaged < 0 {
            return Err(DomainError::validation("receipt quantities cannot be negative"));
        }
        if self.accounted() != self.ordered {
            return Err(DomainError::ReceiptNotReconciled {
                ordered: self.ordered,
                accounted: self.accounted(),
            });
        }
        Ok(())
    }

    /// The stock receipt to post, if any unit was accepted.
    pub fn to_receive_request(&self) -> Option<ReceiveRequest> {
        (self.received > 0).then(|| ReceiveRequest {
            product_id: self.product_id,
            destination: self.destination,
            quantity: self.received,
            expiry_date: self.expiry_date,
            document: DocumentRef::purchase_order_item(self.purchase_order_item),
            source: self.source,
        })
    }
}

/// Result of posting a purchase-order line receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    /// `None` when nothing was accepted into stock.
    pub stock_item: Option<StockItem>,
    /// Expired plus damaged units turned away at the door.
    pub rejected: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(ordered: i64, received: i64, expired: i64, damaged: i64) -> PurchaseLineReceipt {
        PurchaseLineReceipt {
            purchase_order_item: DocumentId::new(),
            product_id: ProductId::new(),
            destination: LocationId::new(),
            ordered,
            received,
            expired,
            damaged,
            expiry_date: NaiveDate::from_ymd_opt(2026, 3, 31),
            source: None,
        }
    }

    #[test]
    fn fully_accounted_line_reconciles() {
        let r = receipt(100, 90, 6, 4);
        assert!(r.reconcile().is_ok());
        assert_eq!(r.rejected(), 10);
        let req = r.to_receive_request().unwrap();
        assert_eq!(req.quantity, 90);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn partially_accounted_line_is_refused() {
        let r = receipt(100, 80, 5, 0);
        assert_eq!(
            r.reconcile(),
            Err(DomainError::ReceiptNotReconciled {
                ordered: 100,
                accounted: 85
            })
        );
    }

    #[test]
    fn nothing_received_posts_nothing() {
        let r = receipt(10, 0, 10, 0);
        assert!(r.reconcile().is_ok());
        assert!(r.to_receive_request().is_none());
    }

    #[test]
    fn negative_counts_are_invalid() {
        assert!(matches!(receipt(10, 12, -2, 0).reconcile(), Err(DomainError::Validation(_))));
    }
}
