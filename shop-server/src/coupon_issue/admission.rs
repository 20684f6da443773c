//! Admission front door (先到先得优惠券领取)
//!
//! Decides acceptance against the store only; the relational row is written
//! later by the consumer. Acceptance order is whoever wins the set-add race,
//! queue order only decides persistence order.

use super::kv::{KvError, KvStore};
use super::keys;
use super::record::AdmissionRecord;
use crate::core::{ShopError, ShopResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct CouponAdmission {
    kv: Arc<dyn KvStore>,
}

impl CouponAdmission {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Accept `user_id` for `coupon_id` and queue the issuance.
    ///
    /// - `CouponAlreadyIssued`: the user is already in the set
    /// - `CouponSoldOut`: this acceptance went over the total quantity
    /// - `CouponNotFound`: the coupon's cache was never initialised
    ///
    /// The set size compared against the stock is the one produced by this
    /// request's own add, so a rejection is only possible once the total
    /// quantity has already been accepted. On every failure after the add the
    /// user is taken out of the set again, so the set only holds users whose
    /// record was queued.
    pub async fn issue(&self, user_id: i64, coupon_id: i64) -> ShopResult<()> {
        let set_key = keys::issued_users(coupon_id);
        let member = user_id.to_string();

        let Some(accepted) = self.kv.set_add_with_size(&set_key, &member).await? else {
            return Err(ShopError::CouponAlreadyIssued { user_id, coupon_id });
        };

        match self.admit(user_id, coupon_id, accepted).await {
            Ok(()) => {
                tracing::debug!(user_id, coupon_id, accepted, "Coupon admission queued");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.kv.set_remove(&set_key, &member).await {
                    tracing::error!(
                        user_id,
                        coupon_id,
                        error = %rollback_err,
                        "Failed to roll back admission set entry"
                    );
                }
                Err(e)
            }
        }
    }

    async fn admit(&self, user_id: i64, coupon_id: i64, accepted: u64) -> ShopResult<()> {
        let stock_key = keys::stock(coupon_id);
        let stock = match self.kv.get(&stock_key).await? {
            Some(raw) => raw.parse::<u64>().map_err(|e| KvError::Malformed {
                key: stock_key.clone(),
                reason: e.to_string(),
            })?,
            None => return Err(ShopError::CouponNotFound(coupon_id)),
        };

        if accepted > stock {
            return Err(ShopError::CouponSoldOut(coupon_id));
        }

        let record = AdmissionRecord::new(user_id, coupon_id, shared::util::now_millis());
        self.kv
            .list_push(&keys::queue(coupon_id), &[record.encode()?])
            .await?;
        Ok(())
    }
}
