//! Service-layer error type
//!
//! `ShopError` is what the mutators, the payment saga and the coupon
//! admission pipeline return. Business rejections, lock contention and
//! infrastructure failures stay distinct variants; `From<ShopError> for
//! AppError` turns them into stable error codes for the upper layer.

use crate::coupon_issue::KvError;
use crate::db::repository::RepoError;
use crate::lock::LockError;
use shared::error::{AppError, ErrorCode};
use shared::models::{DomainError, OrderStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
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

    #[error("User {user_id} already received coupon {coupon_id}")]
    CouponAlreadyIssued { user_id: i64, coupon_id: i64 },

    #[error("Coupon sold out: {0}")]
    CouponSoldOut(i64),

    #[error("Coupon not found or issuance not open: {0}")]
    CouponNotFound(i64),

    #[error("Coupon not valid at this time: {0}")]
    CouponExpired(i64),

    #[error("Issued coupon {user_coupon_id} does not belong to user {user_id}")]
    CouponNotOwned { user_coupon_id: i64, user_id: i64 },

    #[error("Could not acquire lock: {0}")]
    LockAcquisitionFailed(String),

    #[error("Concurrent modification of {entity} {id}")]
    ConcurrencyConflict { entity: &'static str, id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Order {order_id} is {status}, expected PENDING")]
    InvalidOrderState { order_id: i64, status: OrderStatus },

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Repository error: {0}")]
    Repository(#[from] RepoError),

    #[error("Cache error: {0}")]
    Cache(#[from] KvError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ShopResult<T> = Result<T, ShopError>;

impl ShopError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ShopError::NotFound { entity, id }
    }

    /// Legitimate denial rather than contention or an infrastructure failure
    pub fn is_business_rejection(&self) -> bool {
        !matches!(
            self,
            ShopError::LockAcquisitionFailed(_)
                | ShopError::ConcurrencyConflict { .. }
                | ShopError::Repository(_)
                | ShopError::Cache(_)
                | ShopError::Internal(_)
        )
    }
}

impl From<sqlx::Error> for ShopError {
    fn from(err: sqlx::Error) -> Self {
        ShopError::Repository(err.into())
    }
}

impl From<LockError> for ShopError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AcquisitionTimeout { key, .. } => ShopError::LockAcquisitionFailed(key),
            LockError::Backend(msg) => ShopError::Internal(format!("lock backend: {msg}")),
        }
    }
}

impl From<DomainError> for ShopError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientStock {
                product_id,
                available,
                requested,
            } => ShopError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            DomainError::InvalidQuantity(q) => ShopError::InvalidQuantity(q),
            DomainError::InsufficientPoint {
                user_id,
                balance,
                requested,
            } => ShopError::InsufficientPoint {
                user_id,
                balance,
                requested,
            },
            DomainError::InvalidAmount { amount, reason } => ShopError::InvalidAmount { amount, reason },
            DomainError::CouponAlreadyUsed(id) => ShopError::CouponAlreadyUsed(id),
            DomainError::CouponSoldOut(id) => ShopError::CouponSoldOut(id),
            DomainError::CouponExpired(id) => ShopError::CouponExpired(id),
            DomainError::InvalidOrderState { order_id, status } => {
                ShopError::InvalidOrderState { order_id, status }
            }
        }
    }
}

fn not_found_code(entity: &str) -> ErrorCode {
    match entity {
        "order" => ErrorCode::OrderNotFound,
        "product" => ErrorCode::ProductNotFound,
        "user" => ErrorCode::UserNotFound,
        "coupon" => ErrorCode::CouponNotFound,
        "user_coupon" => ErrorCode::UserCouponNotFound,
        _ => ErrorCode::NotFound,
    }
}

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        let message = err.to_string();
        match err {
            ShopError::InsufficientStock {
                product_id,
                available,
                requested,
            } => AppError::with_message(ErrorCode::ProductOutOfStock, message)
                .with_detail("product_id", product_id)
                .with_detail("available", available)
                .with_detail("requested", requested),
            ShopError::InvalidQuantity(q) => {
                AppError::with_message(ErrorCode::InvalidQuantity, message).with_detail("quantity", q)
            }
            ShopError::InsufficientPoint {
                user_id,
                balance,
                requested,
            } => AppError::with_message(ErrorCode::PointInsufficient, message)
                .with_detail("user_id", user_id)
                .with_detail("balance", balance)
                .with_detail("requested", requested),
            ShopError::InvalidAmount { amount, .. } => {
                AppError::with_message(ErrorCode::PointInvalidAmount, message).with_detail("amount", amount)
            }
            ShopError::CouponAlreadyUsed(id) => {
                AppError::with_message(ErrorCode::CouponAlreadyUsed, message).with_detail("user_coupon_id", id)
            }
            ShopError::CouponAlreadyIssued { user_id, coupon_id } => {
                AppError::with_message(ErrorCode::CouponAlreadyIssued, message)
                    .with_detail("user_id", user_id)
                    .with_detail("coupon_id", coupon_id)
            }
            ShopError::CouponSoldOut(id) => {
                AppError::with_message(ErrorCode::CouponSoldOut, message).with_detail("coupon_id", id)
            }
            ShopError::CouponNotFound(id) => {
                AppError::with_message(ErrorCode::CouponNotFound, message).with_detail("coupon_id", id)
            }
            ShopError::CouponExpired(id) => {
                AppError::with_message(ErrorCode::CouponExpired, message).with_detail("coupon_id", id)
            }
            ShopError::CouponNotOwned { user_coupon_id, .. } => {
                AppError::with_message(ErrorCode::CouponNotOwned, message)
                    .with_detail("user_coupon_id", user_coupon_id)
            }
            ShopError::LockAcquisitionFailed(key) => {
                AppError::with_message(ErrorCode::LockBusy, message).with_detail("key", key)
            }
            ShopError::ConcurrencyConflict { entity, id } => {
                AppError::with_message(ErrorCode::ConcurrencyConflict, message)
                    .with_detail("entity", entity)
                    .with_detail("id", id)
            }
            ShopError::NotFound { entity, id } => AppError::with_message(not_found_code(entity), message)
                .with_detail("entity", entity)
                .with_detail("id", id),
            ShopError::InvalidOrderState { order_id, status } => {
                AppError::with_message(ErrorCode::OrderInvalidState, message)
                    .with_detail("order_id", order_id)
                    .with_detail("status", status.as_str())
            }
            ShopError::EmptyOrder => AppError::new(ErrorCode::OrderEmpty),
            ShopError::Repository(e) => {
                // 记录内部错误但不暴露详细信息
                tracing::error!(error = %e, "Repository error");
                AppError::new(ErrorCode::DatabaseError)
            }
            ShopError::Cache(e) => {
                tracing::error!(error = %e, "Cache error");
                AppError::new(ErrorCode::CacheError)
            }
            ShopError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                AppError::new(ErrorCode::InternalError)
            }
        }
    }
}
