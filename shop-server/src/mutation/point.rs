//! Point mutator (`user:{id}:point`)
//!
//! Every successful mutation appends exactly one ledger row carrying the
//! new balance, in the same transaction as the balance update.

use super::MutationContext;
use crate::core::{ShopError, ShopResult};
use crate::db::repository::{point_history, user};
use crate::db::with_fresh_tx;
use crate::lock::{keys, with_lock};
use shared::models::{NewPointHistory, PointHistory, PointTransactionType, User};

/// Default charge unit (充值必须是 1000 的整数倍)
pub const DEFAULT_CHARGE_UNIT: i64 = 1_000;

#[derive(Debug, Clone, Copy)]
enum PointOp {
    Use,
    Charge { unit: i64 },
    Refund,
}

impl PointOp {
    fn apply(self, user: &mut User, amount: i64) -> ShopResult<()> {
        match self {
            PointOp::Use => user.use_point(amount)?,
            PointOp::Charge { unit } => user.charge_point(amount, unit)?,
            PointOp::Refund => user.refund_point(amount)?,
        }
        Ok(())
    }

    /// Ledger only knows CHARGE and USE; a refund is money coming back in
    fn transaction_type(self) -> PointTransactionType {
        match self {
            PointOp::Use => PointTransactionType::Use,
            PointOp::Charge { .. } | PointOp::Refund => PointTransactionType::Charge,
        }
    }
}

#[derive(Clone)]
pub struct PointMutator {
    ctx: MutationContext,
    charge_unit: i64,
}

impl PointMutator {
    pub fn new(ctx: MutationContext, charge_unit: i64) -> Self {
        Self { ctx, charge_unit }
    }

    /// Pay `amount` for `order_id`; fails `InsufficientPoint` if the balance is short
    pub async fn use_point(&self, user_id: i64, order_id: i64, amount: i64) -> ShopResult<User> {
        self.mutate(user_id, Some(order_id), amount, PointOp::Use).await
    }

    /// Top-up; `amount` must be positive and a multiple of the charge unit
    pub async fn charge_point(&self, user_id: i64, amount: i64) -> ShopResult<User> {
        let op = PointOp::Charge {
            unit: self.charge_unit,
        };
        self.mutate(user_id, None, amount, op).await
    }

    /// Give back what `use_point` took for `order_id` (compensation path, no unit rule)
    pub async fn refund_point(&self, user_id: i64, order_id: i64, amount: i64) -> ShopResult<User> {
        self.mutate(user_id, Some(order_id), amount, PointOp::Refund).await
    }

    pub async fn balance(&self, user_id: i64) -> ShopResult<i64> {
        let user = user::find_by_id(&self.ctx.pool, user_id)
            .await?
            .ok_or(ShopError::not_found("user", user_id))?;
        Ok(user.point)
    }

    /// Ledger of `user_id`, oldest first
    pub async fn history(&self, user_id: i64) -> ShopResult<Vec<PointHistory>> {
        Ok(point_history::find_by_user(&self.ctx.pool, user_id).await?)
    }

    async fn mutate(
        &self,
        user_id: i64,
        order_id: Option<i64>,
        amount: i64,
        op: PointOp,
    ) -> ShopResult<User> {
        let key = keys::user_point(user_id);
        let user = with_lock(self.ctx.locks.as_ref(), &key, self.ctx.lock_options, || {
            with_fresh_tx::<_, ShopError, _>(&self.ctx.pool, move |conn| {
                Box::pin(async move {
                    let mut user = user::find_by_id(&mut *conn, user_id)
                        .await?
                        .ok_or(ShopError::not_found("user", user_id))?;
                    op.apply(&mut user, amount)?;
                    user::update_point(&mut *conn, &user).await?;

                    let entry = NewPointHistory::after(&user, order_id, op.transaction_type(), amount);
                    point_history::insert(&mut *conn, &entry, user.updated_at).await?;
                    Ok(user)
                })
            })
        })
        .await?;

        tracing::debug!(user_id, ?order_id, amount, ?op, balance = user.point, "Point balance changed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::test_support;

    async fn seeded(point: i64) -> PointMutator {
        let ctx = test_support::context().await;
        user::create(&ctx.pool, &User::new(1, "kim", point)).await.unwrap();
        PointMutator::new(ctx, DEFAULT_CHARGE_UNIT)
    }

    #[tokio::test]
    async fn use_appends_use_row_with_new_balance() {
        let m = seeded(100).await;
        let u = m.use_point(1, 77, 40).await.unwrap();
        assert_eq!(u.point, 60);

        let ledger = m.history(1).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].transaction_type, PointTransactionType::Use);
        assert_eq!(ledger[0].order_id, Some(77));
        assert_eq!(ledger[0].amount, 40);
        assert_eq!(ledger[0].balance_after, 60);
    }

    #[tokio::test]
    async fn insufficient_point_writes_nothing() {
        let m = seeded(30).await;
        assert!(matches!(
            m.use_point(1, 77, 40).await,
            Err(ShopError::InsufficientPoint {
                user_id: 1,
                balance: 30,
                requested: 40
            })
        ));
        assert_eq!(m.balance(1).await.unwrap(), 30);
        assert!(m.history(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn charge_requires_unit_multiple_but_refund_does_not() {
        let m = seeded(0).await;
        assert!(matches!(
            m.charge_point(1, 1_500).await,
            Err(ShopError::InvalidAmount { amount: 1_500, .. })
        ));
        assert!(matches!(
            m.charge_point(1, 0).await,
            Err(ShopError::InvalidAmount { amount: 0, .. })
        ));
        assert_eq!(m.charge_point(1, 2_000).await.unwrap().point, 2_000);
        assert_eq!(m.refund_point(1, 5, 40).await.unwrap().point, 2_040);

        let ledger = m.history(1).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.iter().all(|h| h.transaction_type == PointTransactionType::Charge));
        assert_eq!(ledger[0].order_id, None);
        assert_eq!(ledger[1].order_id, Some(5));
        assert_eq!(ledger[1].balance_after, 2_040);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let m = seeded(0).await;
        assert!(matches!(
            m.charge_point(2, 1_000).await,
            Err(ShopError::NotFound { entity: "user", id: 2 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn ledger_tracks_every_concurrent_mutation() {
        let m = seeded(100).await;
        let mut handles = Vec::new();
        for i in 0..20 {
            let m = m.clone();
            handles.push(tokio::spawn(async move { m.use_point(1, i, 10).await }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 10);
        assert_eq!(m.balance(1).await.unwrap(), 0);

        let ledger = m.history(1).await.unwrap();
        assert_eq!(ledger.len(), 10);
        let balances: Vec<i64> = ledger.iter().map(|h| h.balance_after).collect();
        assert_eq!(balances, vec![90, 80, 70, 60, 50, 40, 30, 20, 10, 0]);
    }
}
