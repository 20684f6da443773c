//! UserCoupon Model (用户领取的优惠券)

use super::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum UserCouponStatus {
    Issued,
    Used,
}

/// One issued coupon. (user_id, coupon_id) is unique.
///
/// `version` is bumped on every status transition and written back with an
/// expected-version predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct UserCoupon {
    pub id: i64,
    pub user_id: i64,
    pub coupon_id: i64,
    pub status: UserCouponStatus,
    pub version: i64,
    pub issued_at: i64,
    pub used_at: Option<i64>,
}

impl UserCoupon {
    pub fn is_used(&self) -> bool {
        self.status == UserCouponStatus::Used
    }

    /// ISSUED → USED
    pub fn use_coupon(&mut self, now: i64) -> Result<(), DomainError> {
        if self.is_used() {
            return Err(DomainError::CouponAlreadyUsed(self.id));
        }
        self.status = UserCouponStatus::Used;
        self.used_at = Some(now);
        self.version += 1;
        Ok(())
    }

    /// USED → ISSUED, unconditionally (compensation)
    pub fn cancel_use(&mut self) {
        self.status = UserCouponStatus::Issued;
        self.used_at = None;
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued() -> UserCoupon {
        UserCoupon {
            id: 7,
            user_id: 1,
            coupon_id: 10,
            status: UserCouponStatus::Issued,
            version: 0,
            issued_at: 0,
            used_at: None,
        }
    }

    #[test]
    fn use_then_use_again_fails() {
        let mut uc = issued();
        uc.use_coupon(100).unwrap();
        assert!(uc.is_used());
        assert_eq!(uc.used_at, Some(100));
        assert_eq!(uc.version, 1);

        assert_eq!(uc.use_coupon(200), Err(DomainError::CouponAlreadyUsed(7)));
        assert_eq!(uc.used_at, Some(100));
        assert_eq!(uc.version, 1);
    }

    #[test]
    fn cancel_restores_issued() {
        let mut uc = issued();
        uc.use_coupon(100).unwrap();
        uc.cancel_use();
        assert_eq!(uc.status, UserCouponStatus::Issued);
        assert_eq!(uc.used_at, None);
        assert_eq!(uc.version, 2);
        uc.use_coupon(300).unwrap();
    }
}
