//! Resource mutators
//!
//! The only writers of `product.stock_quantity`, `user_coupon.status` and
//! `users.point`. Every operation has the same shape:
//!
//! ```text
//! with_lock(entity key) {
//!     with_fresh_tx { load → domain method → persist }
//! }
//! ```
//!
//! Each call commits on its own, so the payment saga can undo one step
//! without touching the others.

mod coupon_use;
mod point;
mod stock;

pub use coupon_use::CouponUseMutator;
pub use point::{DEFAULT_CHARGE_UNIT, PointMutator};
pub use stock::StockMutator;

use crate::lock::{LockManager, LockOptions};
use sqlx::SqlitePool;
use std::sync::Arc;

/// What every mutator needs: the store, the lock backend and its timeouts
#[derive(Clone)]
pub struct MutationContext {
    pub pool: SqlitePool,
    pub locks: Arc<dyn LockManager>,
    pub lock_options: LockOptions,
}

impl MutationContext {
    pub fn new(pool: SqlitePool, locks: Arc<dyn LockManager>, lock_options: LockOptions) -> Self {
        Self {
            pool,
            locks,
            lock_options,
        }
    }
}
