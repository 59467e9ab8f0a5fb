//! Inventory movement ledger domain module.
//!
//! This crate contains the business rules for per-location stock, expiration
//! batches and the append-only movement ledger, implemented purely as
//! deterministic domain logic (no IO, no storage). The orchestration that
//! reads and writes stores lives in `pharmacy-infra`.

pub mod batch;
pub mod document;
pub mod fifo;
pub mod ledger;
pub mod movement;
pub mod policy;
pub mod receipt;
pub mod stock;

pub use batch::{BatchBalance, ExpirationBatch, NewBatch};
pub use document::{SaleCheckout, SaleLine, TransferDocument, TransferLine, TransferStatus};
pub use fifo::{BatchDraw, FifoPlan, plan_fifo};
pub use ledger::{DocumentKind, DocumentRef, LedgerEntry, MovementType, NewLedgerEntry};
pub use movement::{
    AdjustOutcome, AdjustRequest, DisposeRequest, ReceiveRequest, SaleAllocation, SellRequest,
    TransferOutcome, TransferRequest, check_disposal,
};
pub use policy::{LedgerPolicy, OversellPolicy, ShortfallPolicy, TransferPolicy};
pub use receipt::{PurchaseLineReceipt, ReceiptOutcome};
pub use stock::StockItem;
