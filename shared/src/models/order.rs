//! Order Model

use super::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status
///
/// PENDING is the only state `confirm()`/`fail()` may leave from;
/// CONFIRMED and FAILED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub user_coupon_id: Option<i64>,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn final_amount(&self) -> i64 {
        self.total_amount - self.discount_amount
    }

    pub fn confirm(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Confirmed)
    }

    pub fn fail(&mut self) -> Result<(), DomainError> {
        self.transition(OrderStatus::Failed)
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), DomainError> {
        if self.status != OrderStatus::Pending {
            return Err(DomainError::InvalidOrderState {
                order_id: self.id,
                status: self.status,
            });
        }
        self.status = to;
        self.updated_at = crate::util::now_millis();
        Ok(())
    }
}

/// Order line; `unit_price` is a snapshot taken when the order was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
}

impl OrderItem {
    pub fn subtotal(&self) -> i64 {
        self.unit_price * self.quantity
    }
}
