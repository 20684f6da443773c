//! Coupon Model

use super::DomainError;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Discount kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DiscountType {
    /// `discount_value` is a percentage (0-100) of the order total
    Percentage,
    /// `discount_value` is an absolute amount
    Fixed,
}

/// Coupon entity (发行总量 + 已发行数量)
///
/// `issued_quantity` only grows through the issue consumer; the admission
/// cache, not this row, decides who gets in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: i64,
    pub name: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub total_quantity: i64,
    pub issued_quantity: i64,
    /// Validity window start (Unix millis, inclusive)
    pub valid_from: i64,
    /// Validity window end (Unix millis, inclusive)
    pub valid_until: i64,
    pub created_at: i64,
}

impl Coupon {
    /// Nothing issued yet
    pub fn new(
        id: i64,
        name: impl Into<String>,
        discount_type: DiscountType,
        discount_value: i64,
        total_quantity: i64,
        valid_from: i64,
        valid_until: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            discount_type,
            discount_value,
            total_quantity,
            issued_quantity: 0,
            valid_from,
            valid_until,
            created_at: crate::util::now_millis(),
        }
    }

    pub fn remaining_quantity(&self) -> i64 {
        (self.total_quantity - self.issued_quantity).max(0)
    }

    /// Record `count` more issued coupons
    pub fn issue(&mut self, count: i64) -> Result<(), DomainError> {
        if count <= 0 {
            return Err(DomainError::InvalidQuantity(count));
        }
        if self.issued_quantity + count > self.total_quantity {
            return Err(DomainError::CouponSoldOut(self.id));
        }
        self.issued_quantity += count;
        Ok(())
    }

    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.valid_from <= now_millis && now_millis <= self.valid_until
    }

    /// Discount granted on `amount`; never more than `amount` itself.
    ///
    /// Percentages round half away from zero to the minor unit.
    pub fn calculate_discount(&self, amount: i64) -> i64 {
        if amount <= 0 {
            return 0;
        }
        let discount = match self.discount_type {
            DiscountType::Fixed => self.discount_value,
            DiscountType::Percentage => {
                let pct = Decimal::from(self.discount_value.clamp(0, 100));
                (Decimal::from(amount) * pct / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .to_i64()
                    .unwrap_or(0)
            }
        };
        discount.clamp(0, amount)
    }
}
