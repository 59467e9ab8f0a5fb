//! Multi-line source documents (sale checkout, stock transfer).
//!
//! Documents fan out into one movement request per line. Lines are applied
//! independently: a failing line is reported, its siblings still post.

use serde::{Deserialize, Serialize};

use pharmacy_core::{DocumentId, DomainError, DomainResult, LocationId, ProductId};

use crate::movement::{SellRequest, TransferRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_id: DocumentId,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A point-of-sale checkout against one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCheckout {
    pub origin: LocationId,
    pub lines: Vec<SaleLine>,
}

impl SaleCheckout {
    pub fn requests(&self) -> impl Iterator<Item = SellRequest> + '_ {
        self.lines.iter().map(|line| SellRequest {
            product_id: line.product_id,
            origin: self.origin,
            quantity: line.quantity,
            sale_line: line.line_id,
        })
    }
}

/// Transfer document lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Requested,
    Approved,
    InTransit,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub line_id: DocumentId,
    pub product_id: ProductId,
    /// Quantity actually sent (not the ordered quantity).
    pub quantity: i64,
}

/// A stock transfer between two locations.
///
/// Stock only moves when the document reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDocument {
    pub document_id: DocumentId,
    pub source: LocationId,
    pub destination: LocationId,
    pub status: TransferStatus,
    pub lines: Vec<TransferLine>,
}

impl TransferDocument {
    pub fn ensure_completed(&self) -> DomainResult<()> {
        if self.status != TransferStatus::Completed {
            return Err(DomainError::validation(format!(
                "transfer {} is {:?}; stock moves only on completion",
                self.document_id, self.status
            )));
        }
        Ok(())
    }

    pub fn requests(&self) -> impl Iterator<Item = TransferRequest> + '_ {
        self.lines.iter().map(|line| TransferRequest {
            product_id: line.product_id,
            source: self.source,
            destination: self.destination,
            quantity: line.quantity,
            transfer_line: line.line_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_transfers_move_stock() {
        let mut doc = TransferDocument {
            document_id: DocumentId::new(),
            source: LocationId::new(),
            destination: LocationId::new(),
            status: TransferStatus::InTransit,
            lines: vec![],
        };
        assert!(doc.ensure_completed().is_err());
        doc.status = TransferStatus::Completed;
        assert!(doc.ensure_completed().is_ok());
    }

    #[test]
    fn checkout_fans_out_one_request_per_line() {
        let origin = LocationId::new();
        let checkout = SaleCheckout {
            origin,
            lines: vec![
                SaleLine { line_id: DocumentId::new(), product_id: ProductId::new(), quantity: 2 },
                SaleLine { line_id: DocumentId::new(), product_id: ProductId::new(), quantity: 1 },
            ],
        };
        let requests: Vec<_> = checkout.requests().collect();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.origin == origin));
        assert_eq!(requests[0].sale_line, checkout.lines[0].line_id);
    }
}
