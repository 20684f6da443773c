//! Coupon-use mutator (`userCoupon:{id}`)
//!
//! Serialized by the lock like the other two resources. The version token
//! is still checked on write; a mismatch can only mean a lease expired while
//! the transaction was open, and is reported as `ConcurrencyConflict`
//! without retrying.

use super::MutationContext;
use crate::core::{ShopError, ShopResult};
use crate::db::repository::user_coupon;
use crate::db::with_fresh_tx;
use crate::lock::{keys, with_lock};
use shared::models::{DomainError, UserCoupon};

#[derive(Clone)]
pub struct CouponUseMutator {
    ctx: MutationContext,
}

impl CouponUseMutator {
    pub fn new(ctx: MutationContext) -> Self {
        Self { ctx }
    }

    /// ISSUED → USED; fails `CouponAlreadyUsed` if already USED
    pub async fn use_coupon(&self, user_coupon_id: i64) -> ShopResult<UserCoupon> {
        let uc = self.mutate(user_coupon_id, use_now).await?;
        tracing::debug!(user_coupon_id, version = uc.version, "Coupon marked used");
        Ok(uc)
    }

    /// USED → ISSUED, unconditionally (compensation path)
    pub async fn cancel_use_coupon(&self, user_coupon_id: i64) -> ShopResult<UserCoupon> {
        let uc = self.mutate(user_coupon_id, cancel).await?;
        tracing::debug!(user_coupon_id, version = uc.version, "Coupon use cancelled");
        Ok(uc)
    }

    async fn mutate(
        &self,
        user_coupon_id: i64,
        apply: fn(&mut UserCoupon) -> Result<(), DomainError>,
    ) -> ShopResult<UserCoupon> {
        let key = keys::user_coupon(user_coupon_id);
        with_lock(self.ctx.locks.as_ref(), &key, self.ctx.lock_options, || {
            with_fresh_tx::<_, ShopError, _>(&self.ctx.pool, move |conn| {
                Box::pin(async move {
                    let mut uc = user_coupon::find_by_id(&mut *conn, user_coupon_id)
                        .await?
                        .ok_or(ShopError::not_found("user_coupon", user_coupon_id))?;
                    let expected_version = uc.version;
                    apply(&mut uc)?;
                    if !user_coupon::update_status(&mut *conn, &uc, expected_version).await? {
                        return Err(ShopError::ConcurrencyConflict {
                            entity: "user_coupon",
                            id: user_coupon_id,
                        });
                    }
                    Ok(uc)
                })
            })
        })
        .await
    }
}

fn use_now(uc: &mut UserCoupon) -> Result<(), DomainError> {
    uc.use_coupon(shared::util::now_millis())
}

fn cancel(uc: &mut UserCoupon) -> Result<(), DomainError> {
    uc.cancel_use();
    Ok(())
}
