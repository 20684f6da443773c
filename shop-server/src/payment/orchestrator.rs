//! Payment saga
//!
//! ```text
//! order:{id}:payment lock
//!   ├── decrease_stock × N   (product_id ascending)
//!   ├── use_coupon           (if the order carries one)
//!   ├── use_point            (final amount, skipped when 0)
//!   └── CONFIRMED ── publish OrderConfirmed
//!
//! any step fails ──► compensate newest-first ──► FAILED ──► original error
//! ```

use super::compensation::{CompensationLog, CompletedStep};
use super::events::{ConfirmedOrderView, PaymentEvent, PaymentEventPublisher};
use crate::core::{ShopError, ShopResult};
use crate::db::repository::order;
use crate::lock::{LockManager, LockOptions, keys, with_lock};
use crate::mutation::{CouponUseMutator, MutationContext, PointMutator, StockMutator};
use shared::models::{Order, OrderItem, OrderStatus};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Lease of `order:{id}:payment`.
///
/// The order lock is held across every entity lock wait of the saga, so its
/// lease is never shorter than the entity lease it was derived from.
pub const DEFAULT_ORDER_LOCK_LEASE: Duration = Duration::from_secs(60);

/// The three resource mutators a payment touches
#[derive(Clone)]
pub struct SagaMutators {
    pub stock: StockMutator,
    pub coupons: CouponUseMutator,
    pub points: PointMutator,
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    pool: SqlitePool,
    locks: Arc<dyn LockManager>,
    order_lock: LockOptions,
    mutators: SagaMutators,
    events: PaymentEventPublisher,
}

impl PaymentOrchestrator {
    pub fn new(ctx: MutationContext, mutators: SagaMutators, events: PaymentEventPublisher) -> Self {
        Self {
            pool: ctx.pool,
            locks: ctx.locks,
            order_lock: ctx
                .lock_options
                .with_lease(DEFAULT_ORDER_LOCK_LEASE.max(ctx.lock_options.lease)),
            mutators,
            events,
        }
    }

    /// Override the order lock lease; entity-lock timeouts are unaffected
    pub fn with_order_lock_lease(mut self, lease: Duration) -> Self {
        self.order_lock = self.order_lock.with_lease(lease);
        self
    }

    /// Pay for a PENDING order.
    ///
    /// On success the order is CONFIRMED and an `OrderConfirmed` event is
    /// queued. On failure every step that had completed is undone, the order
    /// is FAILED and the error of the failing step is returned unchanged.
    pub async fn execute(&self, order_id: i64) -> ShopResult<ConfirmedOrderView> {
        let key = keys::order_payment(order_id);
        let view = with_lock(self.locks.as_ref(), &key, self.order_lock, || {
            self.run_saga(order_id)
        })
        .await?;

        tracing::info!(
            order_id,
            final_amount = view.final_amount,
            remaining_point = view.remaining_point,
            "Payment confirmed"
        );
        self.events.publish(PaymentEvent::OrderConfirmed(view.clone()));
        Ok(view)
    }

    async fn run_saga(&self, order_id: i64) -> ShopResult<ConfirmedOrderView> {
        let order = order::find_by_id(&self.pool, order_id)
            .await?
            .ok_or(ShopError::not_found("order", order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(ShopError::InvalidOrderState {
                order_id,
                status: order.status,
            });
        }

        let mut items = order::find_items(&self.pool, order_id).await?;
        if items.is_empty() {
            return Err(ShopError::EmptyOrder);
        }
        // 固定加锁顺序，避免两笔订单交叉持有商品锁
        items.sort_by_key(|item| item.product_id);

        let mut log = CompensationLog::default();
        let outcome = match self.apply_steps(&order, &items, &mut log).await {
            Ok(remaining_point) => self.confirm(&order).await.map(|confirmed| (confirmed, remaining_point)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((confirmed, remaining_point)) => Ok(ConfirmedOrderView {
                final_amount: confirmed.final_amount(),
                order: confirmed,
                items,
                remaining_point,
            }),
            Err(e) => {
                tracing::warn!(
                    order_id,
                    error = %e,
                    completed_steps = log.steps().len(),
                    "Payment failed, compensating"
                );
                let compensation = log.compensate(order_id, &self.mutators).await;
                if compensation.failed > 0 {
                    tracing::error!(
                        target: "compensation",
                        order_id,
                        failed = compensation.failed,
                        attempted = compensation.attempted,
                        "Payment compensation incomplete"
                    );
                }
                self.mark_failed(order).await;
                Err(e)
            }
        }
    }

    /// Run the resource steps, recording each one that committed.
    /// Returns the point balance after payment.
    async fn apply_steps(
        &self,
        order: &Order,
        items: &[OrderItem],
        log: &mut CompensationLog,
    ) -> ShopResult<i64> {
        for item in items {
            self.mutators
                .stock
                .decrease_stock(item.product_id, item.quantity)
                .await?;
            log.record(CompletedStep::StockDecreased {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        if let Some(user_coupon_id) = order.user_coupon_id {
            self.mutators.coupons.use_coupon(user_coupon_id).await?;
            log.record(CompletedStep::CouponUsed { user_coupon_id });
        }

        let amount = order.final_amount();
        if amount == 0 {
            return self.mutators.points.balance(order.user_id).await;
        }
        let user = self.mutators.points.use_point(order.user_id, order.id, amount).await?;
        log.record(CompletedStep::PointUsed {
            user_id: order.user_id,
            order_id: order.id,
            amount,
        });
        Ok(user.point)
    }

    async fn confirm(&self, order: &Order) -> ShopResult<Order> {
        let mut confirmed = order.clone();
        confirmed.confirm()?;
        order::update_status(&self.pool, &confirmed).await?;
        Ok(confirmed)
    }

    async fn mark_failed(&self, mut order: Order) {
        let order_id = order.id;
        if let Err(e) = order.fail() {
            tracing::error!(order_id, error = %e, "Order left PENDING state during payment");
            return;
        }
        if let Err(e) = order::update_status(&self.pool, &order).await {
            tracing::error!(order_id, error = %e, "Failed to persist FAILED order status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{coupon, order::NewOrderItem, product, user, user_coupon};
    use crate::lock::{LocalLockManager, LockError, LockToken};
    use crate::mutation::DEFAULT_CHARGE_UNIT;
    use crate::mutation::test_support;
    use async_trait::async_trait;
    use shared::models::{Coupon, DiscountType, Product, User, UserCouponStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn orchestrator(ctx: MutationContext) -> (PaymentOrchestrator, mpsc::Receiver<PaymentEvent>) {
        let mutators = SagaMutators {
            stock: StockMutator::new(ctx.clone()),
            coupons: CouponUseMutator::new(ctx.clone()),
            points: PointMutator::new(ctx.clone(), DEFAULT_CHARGE_UNIT),
        };
        let (events, rx) = PaymentEventPublisher::channel(16);
        (PaymentOrchestrator::new(ctx, mutators, events), rx)
    }

    async fn seed(pool: &SqlitePool, balance: i64) {
        product::create(pool, &Product::new(2, "Mouse", 10, 5)).await.unwrap();
        product::create(pool, &Product::new(5, "Cable", 10, 5)).await.unwrap();
        user::create(pool, &User::new(1, "kim", balance)).await.unwrap();
    }

    async fn place(pool: &SqlitePool, coupon: Option<i64>, discount: i64) -> i64 {
        let mut conn = pool.acquire().await.unwrap();
        let items = [
            NewOrderItem {
                product_id: 5,
                quantity: 3,
                unit_price: 10,
            },
            NewOrderItem {
                product_id: 2,
                quantity: 1,
                unit_price: 10,
            },
        ];
        let (order, _) = order::create_with_items(&mut conn, 1, coupon, 40, discount, &items, 0)
            .await
            .unwrap();
        order.id
    }

    async fn stock(pool: &SqlitePool, id: i64) -> i64 {
        product::find_by_id(pool, id).await.unwrap().unwrap().stock_quantity
    }

    #[tokio::test]
    async fn confirms_and_publishes() {
        let ctx = test_support::context().await;
        let pool = ctx.pool.clone();
        seed(&pool, 100).await;
        let order_id = place(&pool, None, 0).await;
        let (saga, mut rx) = orchestrator(ctx);

        let view = saga.execute(order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Confirmed);
        assert_eq!(view.final_amount, 40);
        assert_eq!(view.remaining_point, 60);
        assert_eq!(view.items[0].product_id, 2);

        assert_eq!(stock(&pool, 5).await, 2);
        assert_eq!(stock(&pool, 2).await, 4);
        let stored = order::find_by_id(&pool, order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Confirmed);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.order_id(), order_id);
    }

    #[tokio::test]
    async fn point_failure_restores_stock() {
        let ctx = test_support::context().await;
        let pool = ctx.pool.clone();
        seed(&pool, 30).await;
        let order_id = place(&pool, None, 0).await;
        let (saga, mut rx) = orchestrator(ctx);

        let err = saga.execute(order_id).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::InsufficientPoint {
                balance: 30,
                requested: 40,
                ..
            }
        ));
        assert_eq!(stock(&pool, 5).await, 5);
        assert_eq!(stock(&pool, 2).await, 5);
        let stored = order::find_by_id(&pool, order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_order_is_rejected_untouched() {
        let ctx = test_support::context().await;
        let pool = ctx.pool.clone();
        seed(&pool, 100).await;
        let order_id = place(&pool, None, 0).await;
        let (saga, _rx) = orchestrator(ctx);

        saga.execute(order_id).await.unwrap();
        let err = saga.execute(order_id).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::InvalidOrderState {
                status: OrderStatus::Confirmed,
                ..
            }
        ));
        assert_eq!(stock(&pool, 5).await, 2);
        assert_eq!(user::find_by_id(&pool, 1).await.unwrap().unwrap().point, 60);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let ctx = test_support::context().await;
        let (saga, _rx) = orchestrator(ctx);
        assert!(matches!(
            saga.execute(42).await,
            Err(ShopError::NotFound { entity: "order", id: 42 })
        ));
    }

    #[tokio::test]
    async fn fully_discounted_order_skips_point_step() {
        let ctx = test_support::context().await;
        let pool = ctx.pool.clone();
        seed(&pool, 0).await;
        coupon::create(&pool, &Coupon::new(1, "FREE", DiscountType::Percentage, 100, 5, 0, i64::MAX))
            .await
            .unwrap();
        user_coupon::insert_issued(&pool, 1, &[1], 0).await.unwrap();
        let uc = user_coupon::find_by_user_and_coupon(&pool, 1, 1).await.unwrap().unwrap();
        let order_id = place(&pool, Some(uc.id), 40).await;
        let (saga, _rx) = orchestrator(ctx);

        let view = saga.execute(order_id).await.unwrap();
        assert_eq!(view.final_amount, 0);
        assert_eq!(view.remaining_point, 0);
        let uc = user_coupon::find_by_id(&pool, uc.id).await.unwrap().unwrap();
        assert_eq!(uc.status, UserCouponStatus::Used);
    }

    /// Lets the first `allowed` acquisitions of `key` through, then times out
    struct FlakyLocks {
        inner: LocalLockManager,
        key: String,
        allowed: usize,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl LockManager for FlakyLocks {
        async fn acquire(&self, key: &str, options: LockOptions) -> Result<LockToken, LockError> {
            if key == self.key && self.seen.fetch_add(1, Ordering::SeqCst) >= self.allowed {
                return Err(LockError::AcquisitionTimeout {
                    key: key.to_string(),
                    wait_ms: options.wait.as_millis() as u64,
                });
            }
            self.inner.acquire(key, options).await
        }

        async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
            self.inner.release(token).await
        }
    }

    #[tokio::test]
    async fn failed_compensation_step_does_not_stop_the_rest() {
        let base = test_support::context().await;
        let pool = base.pool.clone();
        seed(&pool, 10).await;
        coupon::create(&pool, &Coupon::new(1, "FIVE", DiscountType::Fixed, 5, 5, 0, i64::MAX))
            .await
            .unwrap();
        user_coupon::insert_issued(&pool, 1, &[1], 0).await.unwrap();
        let uc = user_coupon::find_by_user_and_coupon(&pool, 1, 1).await.unwrap().unwrap();
        let order_id = place(&pool, Some(uc.id), 5).await;

        // use_coupon gets the lock, cancel_use_coupon does not
        let locks = Arc::new(FlakyLocks {
            inner: LocalLockManager::new(),
            key: keys::user_coupon(uc.id),
            allowed: 1,
            seen: AtomicUsize::new(0),
        });
        let ctx = MutationContext::new(pool.clone(), locks, base.lock_options);
        let (saga, _rx) = orchestrator(ctx);

        let err = saga.execute(order_id).await.unwrap_err();
        assert!(matches!(err, ShopError::InsufficientPoint { requested: 35, .. }));

        assert_eq!(stock(&pool, 5).await, 5);
        assert_eq!(stock(&pool, 2).await, 5);
        let uc = user_coupon::find_by_id(&pool, uc.id).await.unwrap().unwrap();
        assert_eq!(uc.status, UserCouponStatus::Used);
        let stored = order::find_by_id(&pool, order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
    }

    /// Remembers the options of every acquisition
    struct RecordingLocks {
        inner: LocalLockManager,
        seen: parking_lot::Mutex<Vec<(String, LockOptions)>>,
    }

    #[async_trait]
    impl LockManager for RecordingLocks {
        async fn acquire(&self, key: &str, options: LockOptions) -> Result<LockToken, LockError> {
            self.seen.lock().push((key.to_string(), options));
            self.inner.acquire(key, options).await
        }

        async fn release(&self, token: &LockToken) -> Result<bool, LockError> {
            self.inner.release(token).await
        }
    }

    #[tokio::test]
    async fn order_lock_outlives_every_entity_wait() {
        let base = test_support::context().await;
        let pool = base.pool.clone();
        seed(&pool, 100).await;
        let order_id = place(&pool, None, 0).await;

        let locks = Arc::new(RecordingLocks {
            inner: LocalLockManager::new(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let entity = LockOptions::new(Duration::from_millis(5_000), Duration::from_millis(3_000));
        let ctx = MutationContext::new(pool.clone(), locks.clone(), entity);
        let (saga, _rx) = orchestrator(ctx);
        saga.execute(order_id).await.unwrap();

        let seen = locks.seen.lock().clone();
        let order_lock = seen
            .iter()
            .find(|(key, _)| *key == keys::order_payment(order_id))
            .map(|(_, options)| *options)
            .unwrap();
        assert_eq!(order_lock.lease, DEFAULT_ORDER_LOCK_LEASE);
        let entity_waits: Vec<_> = seen
            .iter()
            .filter(|(key, _)| *key != keys::order_payment(order_id))
            .map(|(_, options)| options.wait)
            .collect();
        // two stock lines and the point step
        assert_eq!(entity_waits.len(), 3);
        assert!(entity_waits.iter().sum::<Duration>() < order_lock.lease);
    }

    #[tokio::test]
    async fn order_lock_lease_can_be_overridden() {
        let ctx = test_support::context().await;
        let (saga, _rx) = orchestrator(ctx);
        let saga = saga.with_order_lock_lease(Duration::from_secs(120));
        assert_eq!(saga.order_lock.lease, Duration::from_secs(120));
        assert_eq!(saga.order_lock.wait, LockOptions::default().wait);
    }
}
