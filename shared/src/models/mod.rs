//! Data models
//!
//! Rows of the relational store together with the invariants that guard
//! them. DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY), amounts are minor units.

pub mod coupon;
pub mod order;
pub mod point_history;
pub mod product;
pub mod user;
pub mod user_coupon;

// Re-exports
pub use coupon::*;
pub use order::*;
pub use point_history::*;
pub use product::*;
pub use user::*;
pub use user_coupon::*;

use thiserror::Error;

/// Invariant violations raised by the model methods
///
/// These never leave the model half-mutated: a method that returns an error
/// has not changed `self`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i64,
        available: i64,
        requested: i64,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Insufficient point for user {user_id}: balance {balance}, requested {requested}")]
    InsufficientPoint {
        user_id: i64,
        balance: i64,
        requested: i64,
    },

    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: i64, reason: &'static str },

    #[error("Coupon already used: {0}")]
    CouponAlreadyUsed(i64),

    #[error("Coupon sold out: {0}")]
    CouponSoldOut(i64),

    #[error("Coupon not valid at this time: {0}")]
    CouponExpired(i64),

    #[error("Order {order_id} is {status}, expected PENDING")]
    InvalidOrderState { order_id: i64, status: OrderStatus },
}
