//! Admission cache (re)initialisation
//!
//! The store decides admission; the relational tables stay authoritative for
//! what has been issued. This rebuilds a coupon's admission keys from the
//! tables so the two agree before admission opens.

use super::keys;
use super::kv::KvStore;
use super::record::AdmissionRecord;
use crate::core::{ShopError, ShopResult};
use crate::db::repository::{coupon, user_coupon};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct CouponCacheInitializer {
    pool: SqlitePool,
    kv: Arc<dyn KvStore>,
}

impl CouponCacheInitializer {
    pub fn new(pool: SqlitePool, kv: Arc<dyn KvStore>) -> Self {
        Self { pool, kv }
    }

    /// Rebuild the set and stock keys of one coupon and open it for admission.
    ///
    /// The set becomes every user holding a row plus every user still waiting
    /// in the queue, so queued-but-unpersisted admissions keep their seat.
    /// Returns the number of accepted users.
    pub async fn init_coupon(&self, coupon_id: i64) -> ShopResult<usize> {
        let coupon = coupon::find_by_id(&self.pool, coupon_id)
            .await?
            .ok_or(ShopError::not_found("coupon", coupon_id))?;

        let mut users: BTreeSet<i64> = user_coupon::user_ids_for_coupon(&self.pool, coupon_id)
            .await?
            .into_iter()
            .collect();
        let persisted = users.len();

        for raw in self.kv.list_range(&keys::queue(coupon_id)).await? {
            match AdmissionRecord::decode(&raw) {
                Ok(record) => {
                    users.insert(record.user_id);
                }
                Err(e) => tracing::warn!(coupon_id, error = %e, "Skipping malformed queued record"),
            }
        }

        let set_key = keys::issued_users(coupon_id);
        self.kv.delete(&set_key).await?;
        for user_id in &users {
            self.kv.set_add(&set_key, &user_id.to_string()).await?;
        }
        self.kv
            .set(&keys::stock(coupon_id), &coupon.total_quantity.to_string())
            .await?;
        self.kv
            .set_add(keys::COUPON_REGISTRY, &coupon_id.to_string())
            .await?;

        tracing::info!(
            coupon_id,
            total = coupon.total_quantity,
            persisted,
            queued = users.len() - persisted,
            "Coupon admission cache initialised"
        );
        Ok(users.len())
    }

    /// Startup warmup: every coupon still inside its validity window.
    ///
    /// A coupon that fails to initialise is logged and stays closed; the
    /// rest are still opened. Returns how many were opened.
    pub async fn init_all(&self) -> ShopResult<usize> {
        let now = shared::util::now_millis();
        let mut count = 0;
        for c in coupon::find_all(&self.pool).await? {
            if c.valid_until < now {
                continue;
            }
            match self.init_coupon(c.id).await {
                Ok(_) => count += 1,
                Err(e) => {
                    tracing::error!(coupon_id = c.id, error = %e, "Failed to initialise coupon admission cache")
                }
            }
        }
        Ok(count)
    }
}
