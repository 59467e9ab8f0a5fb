//! `pharmacy-core`: shared building blocks for the pharmacy inventory ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model and the optimistic
//! concurrency expectation used by stock rows.

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{BatchId, DocumentId, EntryId, LocationId, ProductId, StockItemId};
pub use version::ExpectedVersion;
