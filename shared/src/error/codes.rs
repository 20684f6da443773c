//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment / point errors
//! - 6xxx: Product errors
//! - 7xxx: Coupon errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Resource not found
    NotFound = 3,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is empty
    OrderEmpty = 4007,
    /// Order is not in a state that allows the operation
    OrderInvalidState = 4008,

    // ==================== 5xxx: Payment ====================
    /// User (point account) not found
    UserNotFound = 5101,
    /// Point balance is insufficient
    PointInsufficient = 5102,
    /// Point amount is invalid
    PointInvalidAmount = 5103,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product is out of stock
    ProductOutOfStock = 6003,
    /// Quantity is not positive
    InvalidQuantity = 6004,

    // ==================== 7xxx: Coupon ====================
    /// Coupon not found (or issuance not opened for it)
    CouponNotFound = 7001,
    /// All coupons have been issued
    CouponSoldOut = 7002,
    /// User already received this coupon
    CouponAlreadyIssued = 7003,
    /// Coupon has already been used
    CouponAlreadyUsed = 7004,
    /// Coupon is outside its validity window
    CouponExpired = 7005,
    /// Issued coupon not found
    UserCouponNotFound = 7006,
    /// Issued coupon belongs to another user
    CouponNotOwned = 7007,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Cache (in-memory store) error
    CacheError = 9003,
    /// Resource lock could not be acquired in time
    LockBusy = 9405,
    /// Concurrent modification detected
    ConcurrencyConflict = 9406,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::NotFound => "Resource not found",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order is empty",
            ErrorCode::OrderInvalidState => "Order is not pending",

            // Payment
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::PointInsufficient => "Insufficient point balance",
            ErrorCode::PointInvalidAmount => "Invalid point amount",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductOutOfStock => "Product is out of stock",
            ErrorCode::InvalidQuantity => "Quantity must be positive",

            // Coupon
            ErrorCode::CouponNotFound => "Coupon not found",
            ErrorCode::CouponSoldOut => "Coupon is sold out",
            ErrorCode::CouponAlreadyIssued => "Coupon has already been issued to this user",
            ErrorCode::CouponAlreadyUsed => "Coupon has already been used",
            ErrorCode::CouponExpired => "Coupon is not valid at this time",
            ErrorCode::UserCouponNotFound => "Issued coupon not found",
            ErrorCode::CouponNotOwned => "Coupon belongs to another user",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::CacheError => "Cache error",
            ErrorCode::LockBusy => "Resource is busy, please retry later",
            ErrorCode::ConcurrencyConflict => "Resource was modified concurrently",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            3 => Ok(ErrorCode::NotFound),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4007 => Ok(ErrorCode::OrderEmpty),
            4008 => Ok(ErrorCode::OrderInvalidState),

            // Payment
            5101 => Ok(ErrorCode::UserNotFound),
            5102 => Ok(ErrorCode::PointInsufficient),
            5103 => Ok(ErrorCode::PointInvalidAmount),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),
            6003 => Ok(ErrorCode::ProductOutOfStock),
            6004 => Ok(ErrorCode::InvalidQuantity),

            // Coupon
            7001 => Ok(ErrorCode::CouponNotFound),
            7002 => Ok(ErrorCode::CouponSoldOut),
            7003 => Ok(ErrorCode::CouponAlreadyIssued),
            7004 => Ok(ErrorCode::CouponAlreadyUsed),
            7005 => Ok(ErrorCode::CouponExpired),
            7006 => Ok(ErrorCode::UserCouponNotFound),
            7007 => Ok(ErrorCode::CouponNotOwned),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::CacheError),
            9405 => Ok(ErrorCode::LockBusy),
            9406 => Ok(ErrorCode::ConcurrencyConflict),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}
