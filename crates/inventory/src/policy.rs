//! Explicit policies for the ledger's lenient corners.
//!
//! A till that must keep selling can drive stock negative or sell past the
//! tracked batches; a lenient transfer floors the source deduction while
//! crediting the destination in full. Each of those is a named choice here.

use serde::{Deserialize, Serialize};

use pharmacy_core::DomainError;

/// What a sale does when demand exceeds on-hand quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversellPolicy {
    /// Record the negative balance and log a warning.
    #[default]
    Allow,
    /// Fail with `InsufficientStock` before any mutation.
    Reject,
}

/// What a sale does when expiry-tracked batches cannot cover the demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortfallPolicy {
    /// Allocate what the batches hold, log and report the shortfall.
    #[default]
    Accept,
    /// Fail with `UnallocatedDemand` before any mutation.
    Reject,
}

/// How a transfer treats a source holding less than the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPolicy {
    /// Fail with `InsufficientStock`; quantity is always conserved.
    #[default]
    Strict,
    /// Deduct only what is available but credit the destination in full.
    Lenient,
}

/// Policy bundle handed to the ledger engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LedgerPolicy {
    pub oversell: OversellPolicy,
    pub shortfall: ShortfallPolicy,
    pub transfer: TransferPolicy,
}

macro_rules! impl_policy_from_str {
    ($t:ty, $name:literal, { $($label:literal => $variant:expr),+ $(,)? }) => {
        impl core::str::FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($label => Ok($variant),)+
                    other => Err(DomainError::validation(format!(
                        "unknown {} '{}'",
                        $name, other
                    ))),
                }
            }
        }
    };
}

impl_policy_from_str!(OversellPolicy, "oversell policy", {
    "allow" => OversellPolicy::Allow,
    "reject" => OversellPolicy::Reject,
});

impl_policy_from_str!(ShortfallPolicy, "shortfall policy", {
    "accept" => ShortfallPolicy::Accept,
    "reject" => ShortfallPolicy::Reject,
});

impl_policy_from_str!(TransferPolicy, "transfer policy", {
    "strict" => TransferPolicy::Strict,
    "lenient" => TransferPolicy::Lenient,
});
