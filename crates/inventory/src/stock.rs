use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pharmacy_core::{DomainError, DomainResult, LocationId, ProductId, StockItemId};

/// Current on-hand quantity of one product at one location.
///
/// Unique per (product, location). Quantities are signed: the sale path is
/// allowed to record an oversell (see `OversellPolicy`), every other path keeps
/// the quantity at or above zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: StockItemId,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    /// Row version, bumped by the store on every write.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// A fresh, empty row for (product, location).
    pub fn new(product_id: ProductId, location_id: LocationId, now: DateTime<Utc>) -> Self {
        Self {
            id: StockItemId::new(),
            product_id,
            location_id,
            quantity: 0,
            version: 0,
            updated_at: now,
        }
    }

    pub fn credit(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| self.overflow("credit", quantity))?;
        Ok(())
    }

    /// Unconditional depletion; the result may be negative.
    pub fn debit(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        self.quantity = self
            .quantity
            .checked_sub(quantity)
            .ok_or_else(|| self.overflow("debit", quantity))?;
        Ok(())
    }

    /// Depletion that refuses to take the row below zero.
    pub fn debit_exact(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        if self.quantity < quantity {
            return Err(DomainError::InsufficientStock {
                requested: quantity,
                available: self.quantity.max(0),
            });
        }
        self.quantity -= quantity;
        Ok(())
    }

    /// Deduct at most what is on hand. Returns the amount actually deducted.
    pub fn debit_floored(&mut self, quantity: i64) -> DomainResult<i64> {
        ensure_positive(quantity)?;
        let deducted = quantity.min(self.quantity.max(0));
        self.quantity -= deducted;
        Ok(deducted)
    }

    /// Overwrite the quantity with a physical count. Returns `counted - previous`.
    pub fn set_counted(&mut self, counted: i64) -> DomainResult<i64> {
        if counted < 0 {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        let delta = counted
            .checked_sub(self.quantity)
            .ok_or_else(|| self.overflow("count adjustment", counted))?;
        self.quantity = counted;
        Ok(delta)
    }

    fn overflow(&self, operation: &str, quantity: i64) -> DomainError {
        DomainError::invariant(format!(
            "{operation} of {quantity} on stock item {} (on hand {}) overflows",
            self.id, self.quantity
        ))
    }
}

pub(crate) fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be positive (got {quantity})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with(quantity: i64) -> StockItem {
        let mut item = StockItem::new(ProductId::new(), LocationId::new(), Utc::now());
        item.quantity = quantity;
        item
    }

    #[test]
    fn debit_may_go_negative() {
        let mut item = item_with(5);
        item.debit(8).unwrap();
        assert_eq!(item.quantity, -3);
    }

    #[test]
    fn debit_exact_rejects_insufficient_stock() {
        let mut item = item_with(5);
        let err = item.debit_exact(8).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 8,
                available: 5
            }
        );
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn debit_floored_stops_at_zero() {
        let mut item = item_with(5);
        assert_eq!(item.debit_floored(8).unwrap(), 5);
        assert_eq!(item.quantity, 0);

        let mut negative = item_with(-2);
        assert_eq!(negative.debit_floored(3).unwrap(), 0);
        assert_eq!(negative.quantity, -2);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let mut item = item_with(5);
        assert!(matches!(item.credit(0), Err(DomainError::Validation(_))));
        assert!(matches!(item.debit(-1), Err(DomainError::Validation(_))));
    }

    #[test]
    fn set_counted_returns_signed_difference() {
        let mut item = item_with(10);
        assert_eq!(item.set_counted(7).unwrap(), -3);
        assert_eq!(item.set_counted(12).unwrap(), 5);
        assert_eq!(item.quantity, 12);
        assert!(item.set_counted(-1).is_err());
    }

    #[test]
    fn arithmetic_overflow_is_refused() {
        let mut full = item_with(i64::MAX);
        assert!(matches!(full.credit(1), Err(DomainError::InvariantViolation(_))));
        assert_eq!(full.quantity, i64::MAX);

        let mut oversold = item_with(i64::MIN + 1);
        assert!(matches!(oversold.debit(2), Err(DomainError::InvariantViolation(_))));
        assert_eq!(oversold.quantity, i64::MIN + 1);

        let mut counted = item_with(-2);
        assert!(matches!(
            counted.set_counted(i64::MAX),
            Err(DomainError::InvariantViolation(_))
        ));
        assert_eq!(counted.quantity, -2);
    }
}
