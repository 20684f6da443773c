//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::UserNotFound
            | Self::ProductNotFound
            | Self::CouponNotFound
            | Self::UserCouponNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::OrderInvalidState
            | Self::CouponAlreadyIssued
            | Self::CouponAlreadyUsed
            | Self::ConcurrencyConflict => StatusCode::CONFLICT,

            // 403 Forbidden
            Self::CouponNotOwned => StatusCode::FORBIDDEN,

            // 422 Unprocessable (business rule rejections)
            Self::PointInsufficient
            | Self::ProductOutOfStock
            | Self::CouponSoldOut
            | Self::CouponExpired => StatusCode::UNPROCESSABLE_ENTITY,

            // 400 Bad Request
            Self::OrderEmpty
            | Self::PointInvalidAmount
            | Self::InvalidQuantity => StatusCode::BAD_REQUEST,

            // 503 Service Unavailable (contention, try again later)
            Self::LockBusy => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::CacheError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contention_is_distinct_from_business_rejection() {
        assert_eq!(ErrorCode::LockBusy.http_status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ErrorCode::ProductOutOfStock.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_not_found_family() {
        assert_eq!(ErrorCode::OrderNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::CouponNotFound.http_status(), StatusCode::NOT_FOUND);
    }
}
