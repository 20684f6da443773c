//! Product Model

use super::DomainError;
use serde::{Deserialize, Serialize};

/// Product entity
///
/// `stock_quantity` is the only mutable counter and is written exclusively by
/// the stock mutator. `original_stock_quantity` is the baseline the
/// popularity ranking divides by and never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub stock_quantity: i64,
    pub original_stock_quantity: i64,
    pub view_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// New product whose stock starts at its baseline
    pub fn new(id: i64, name: impl Into<String>, price: i64, stock_quantity: i64) -> Self {
        let now = crate::util::now_millis();
        Self {
            id,
            name: name.into(),
            price,
            stock_quantity,
            original_stock_quantity: stock_quantity,
            view_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Take `quantity` units out of stock, failing closed if not enough remain
    pub fn decrease_stock(&mut self, quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        if self.stock_quantity < quantity {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                available: self.stock_quantity,
                requested: quantity,
            });
        }
        self.stock_quantity -= quantity;
        self.updated_at = crate::util::now_millis();
        Ok(())
    }

    /// Put `quantity` units back. No upper bound is enforced beyond what
    /// the counter can represent.
    pub fn increase_stock(&mut self, quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        self.stock_quantity = self
            .stock_quantity
            .checked_add(quantity)
            .ok_or(DomainError::InvalidQuantity(quantity))?;
        self.updated_at = crate::util::now_millis();
        Ok(())
    }

    /// Share of the original stock that `quantity` units represent
    pub fn popularity_weight(&self, quantity: i64) -> f64 {
        if self.original_stock_quantity <= 0 {
            return 0.0;
        }
        quantity as f64 / self.original_stock_quantity as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrease_fails_closed_and_leaves_stock_unchanged() {
        let mut p = Product::new(1, "Keyboard", 50_000, 3);
        let err = p.decrease_stock(4).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: 1,
                available: 3,
                requested: 4
            }
        );
        assert_eq!(p.stock_quantity, 3);

        p.decrease_stock(3).unwrap();
        assert_eq!(p.stock_quantity, 0);
        assert!(p.decrease_stock(1).is_err());
        assert_eq!(p.stock_quantity, 0);
    }

    #[test]
    fn increase_has_no_upper_bound_and_keeps_baseline() {
        let mut p = Product::new(1, "Mouse", 20_000, 1);
        p.increase_stock(10).unwrap();
        assert_eq!(p.stock_quantity, 11);
        assert_eq!(p.original_stock_quantity, 1);
    }

    #[test]
    fn increase_past_the_counter_limit_is_rejected() {
        let mut p = Product::new(1, "Cable", 500, 1);
        assert_eq!(p.increase_stock(i64::MAX), Err(DomainError::InvalidQuantity(i64::MAX)));
        assert_eq!(p.stock_quantity, 1);
        p.increase_stock(i64::MAX - 1).unwrap();
        assert_eq!(p.stock_quantity, i64::MAX);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let mut p = Product::new(1, "Pad", 1_000, 5);
        assert_eq!(p.decrease_stock(0), Err(DomainError::InvalidQuantity(0)));
        assert_eq!(p.increase_stock(-2), Err(DomainError::InvalidQuantity(-2)));
        assert_eq!(p.stock_quantity, 5);
    }

    #[test]
    fn popularity_weight_is_relative_to_baseline() {
        let p = Product::new(1, "Cable", 500, 200);
        assert!((p.popularity_weight(50) - 0.25).abs() < f64::EPSILON);
        let empty = Product::new(2, "Ghost", 500, 0);
        assert_eq!(empty.popularity_weight(1), 0.0);
    }
}
