//! First-expiring-first-out allocation of a depletion over open batches.
//!
//! Planning is pure: it decides how much to take from which batch and how
//! much demand is left uncovered. Applying the plan (batch updates and ledger
//! entries) is the engine's job.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pharmacy_core::BatchId;

use crate::batch::ExpirationBatch;

/// Quantity taken from one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDraw {
    pub batch_id: BatchId,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
}

/// Outcome of FIFO planning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FifoPlan {
    /// Draws in consumption order.
    pub draws: Vec<BatchDraw>,
    /// Demand not covered by any batch.
    pub shortfall: i64,
}

impl FifoPlan {
    pub fn allocated(&self) -> i64 {
        self.draws.iter().map(|d| d.quantity).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }
}

/// Plan a depletion of `demand` units over `batches`.
///
/// Only open batches (remaining > 0) take part. They are consumed by
/// ascending expiry date, ties broken by creation sequence. Non-positive
/// demand yields an empty plan.
pub fn plan_fifo<'a, I>(batches: I, demand: i64) -> FifoPlan
where
    I: IntoIterator<Item = &'a ExpirationBatch>,
{
    let mut open: Vec<&ExpirationBatch> = batches.into_iter().filter(|b| b.is_open()).collect();
    open.sort_by_key(|b| b.fifo_key());

    let mut remaining = demand.max(0);
    let mut draws = Vec::new();

    for batch in open {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.remaining);
        draws.push(BatchDraw {
            batch_id: batch.id,
            expiry_date: batch.expiry_date,
            quantity: take,
        });
        remaining -= take;
    }

    FifoPlan {
        draws,
        shortfall: remaining,
    }
}
