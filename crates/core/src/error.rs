//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, quantity rules,
/// conflicts). Lookups against the store and reference data are reported by
/// the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Not enough on-hand stock for a movement that refuses to go negative.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A disposal asked for more than the stock item or the batch holds.
    #[error(
        "disposal of {requested} exceeds available stock (on hand {on_hand}, batch remaining {batch_remaining})"
    )]
    ExcessiveDisposalQuantity {
        requested: i64,
        on_hand: i64,
        batch_remaining: i64,
    },

    /// Expiry-tracked batches cannot cover a sale and the policy forbids it.
    #[error("sale of {demanded} cannot be covered by tracked batches ({allocatable} available)")]
    UnallocatedDemand { demanded: i64, allocatable: i64 },

    /// A purchase-order line receipt does not account for the ordered quantity.
    #[error("receipt accounts for {accounted} of {ordered} ordered units")]
    ReceiptNotReconciled { ordered: i64, accounted: i64 },

    /// A conflict occurred (stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
