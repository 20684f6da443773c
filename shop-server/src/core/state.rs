//! 服务状态 - 持有所有服务的共享引用
//!
//! | 字段 | 说明 |
//! |------|------|
//! | config | 配置项 (不可变) |
//! | db | SQLite 连接池 |
//! | locks / kv | 锁与发券缓存后端 (本地或 Redis) |
//! | stock / coupons / points | 资源变更器 |
//! | orders / payment | 下单与支付编排 |
//! | admission / cache / consumer | 发券流水线 |
//! | popularity | 商品热度排行 |

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::Config;
use crate::coupon_issue::{CouponAdmission, CouponCacheInitializer, IssueConsumer, KvStore, MemoryKvStore};
use crate::db::DbService;
use crate::lock::{LocalLockManager, LockManager};
use crate::mutation::{CouponUseMutator, MutationContext, PointMutator, StockMutator};
use crate::orders::OrderService;
use crate::payment::{
    LogNotificationSink, NotificationSink, PaymentEvent, PaymentEventPublisher, PaymentEventWorker,
    PaymentOrchestrator, PopularityRanking, SagaMutators, WebhookNotificationSink,
};
use shared::AppError;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 服务状态
///
/// 所有字段都是廉价克隆的句柄 (连接池、Arc)。
#[derive(Clone)]
pub struct ShopState {
    pub config: Config,
    pub db: DbService,
    pub locks: Arc<dyn LockManager>,
    pub kv: Arc<dyn KvStore>,

    pub stock: StockMutator,
    pub coupons: CouponUseMutator,
    pub points: PointMutator,

    pub orders: OrderService,
    pub payment: PaymentOrchestrator,
    pub popularity: PopularityRanking,

    pub admission: CouponAdmission,
    pub cache: CouponCacheInitializer,
    pub consumer: IssueConsumer,
}

/// 支付事件的消费端，只能被一个 Worker 拿走
pub struct EventPipeline {
    pub receiver: mpsc::Receiver<PaymentEvent>,
    pub worker: PaymentEventWorker,
}

impl ShopState {
    /// 按配置初始化所有服务
    ///
    /// 1. 打开数据库并执行迁移
    /// 2. 选择锁与缓存后端
    /// 3. 组装变更器、支付编排、发券流水线
    pub async fn initialize(config: &Config) -> Result<(Self, EventPipeline), AppError> {
        let db = if config.is_in_memory() {
            DbService::in_memory().await?
        } else {
            DbService::new(&config.database_url).await?
        };
        let (locks, kv) = backends(config).await?;

        let ctx = MutationContext::new(db.pool.clone(), locks.clone(), config.lock_options());
        let stock = StockMutator::new(ctx.clone());
        let coupons = CouponUseMutator::new(ctx.clone());
        let points = PointMutator::new(ctx.clone(), config.point_charge_unit);

        let (publisher, receiver) = PaymentEventPublisher::channel(config.event_channel_capacity);
        let payment = PaymentOrchestrator::new(
            ctx,
            SagaMutators {
                stock: stock.clone(),
                coupons: coupons.clone(),
                points: points.clone(),
            },
            publisher,
        )
        .with_order_lock_lease(config.payment_lock_lease());

        let popularity = PopularityRanking::new(db.pool.clone(), kv.clone());
        let sink = notification_sink(config)?;
        let worker = PaymentEventWorker::new(popularity.clone(), sink);

        let state = Self {
            config: config.clone(),
            orders: OrderService::new(db.pool.clone()),
            admission: CouponAdmission::new(kv.clone()),
            cache: CouponCacheInitializer::new(db.pool.clone(), kv.clone()),
            consumer: IssueConsumer::new(
                db.pool.clone(),
                kv.clone(),
                config.issue_batch_size,
                config.issue_max_delivery_attempts,
            ),
            db,
            locks,
            kv,
            stock,
            coupons,
            points,
            payment,
            popularity,
        };

        tracing::info!(environment = %config.environment, "Shop state initialized");
        Ok((state, EventPipeline { receiver, worker }))
    }

    /// 注册后台任务
    ///
    /// - Warmup: 发券缓存重建 (失败只记日志)
    /// - Periodic: 发券消费者
    /// - Worker: 支付事件
    pub async fn start_background_tasks(&self, tasks: &mut BackgroundTasks, events: EventPipeline) {
        let cache = self.cache.clone();
        tasks
            .run_warmup("coupon_cache_init", async move {
                cache.init_all().await.map(|count| {
                    tracing::info!(coupons = count, "Coupon admission cache rebuilt");
                })
            })
            .await;

        tasks.spawn(
            "issue_consumer",
            TaskKind::Periodic,
            self.consumer
                .clone()
                .run(self.config.issue_consumer_interval(), tasks.shutdown_token()),
        );

        tasks.spawn(
            "payment_event_worker",
            TaskKind::Worker,
            events.worker.run(events.receiver, tasks.shutdown_token()),
        );

        tasks.log_summary();
    }
}

fn notification_sink(config: &Config) -> Result<Arc<dyn NotificationSink>, AppError> {
    match &config.notification_webhook_url {
        Some(url) => {
            let sink = WebhookNotificationSink::new(url.as_str())
                .map_err(|e| AppError::internal(format!("Failed to build notification client: {e}")))?;
            tracing::info!(url = %url, "Order notifications go to webhook");
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(LogNotificationSink)),
    }
}

#[cfg(feature = "redis")]
async fn backends(config: &Config) -> Result<(Arc<dyn LockManager>, Arc<dyn KvStore>), AppError> {
    use crate::coupon_issue::RedisKvStore;
    use crate::lock::RedisLockManager;

    let Some(url) = &config.redis_url else {
        return Ok(local_backends());
    };
    let locks = RedisLockManager::connect(url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect lock backend: {e}")))?;
    let kv = RedisKvStore::connect(url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect cache backend: {e}")))?;
    tracing::info!("Locks and admission cache backed by Redis");
    Ok((Arc::new(locks), Arc::new(kv)))
}

#[cfg(not(feature = "redis"))]
async fn backends(config: &Config) -> Result<(Arc<dyn LockManager>, Arc<dyn KvStore>), AppError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis feature is disabled, using in-process backends");
    }
    Ok(local_backends())
}

fn local_backends() -> (Arc<dyn LockManager>, Arc<dyn KvStore>) {
    tracing::info!("Locks and admission cache are in-process (single instance only)");
    (Arc::new(LocalLockManager::new()), Arc::new(MemoryKvStore::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{product, user};
    use crate::orders::OrderLine;
    use shared::models::{OrderStatus, Product, User};
    use std::time::Duration;

    #[tokio::test]
    async fn wires_a_working_checkout() {
        let (state, events) = ShopState::initialize(&Config::for_tests()).await.unwrap();
        product::create(&state.db.pool, &Product::new(1, "Mug", 20, 3)).await.unwrap();
        user::create(&state.db.pool, &User::new(1, "kim", 50)).await.unwrap();

        let mut tasks = BackgroundTasks::new();
        state.start_background_tasks(&mut tasks, events).await;
        assert_eq!(tasks.len(), 2);

        let placed = state
            .orders
            .create_order(1, &[OrderLine::new(1, 2)], None)
            .await
            .unwrap();
        let view = state.payment.execute(placed.order.id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Confirmed);
        assert_eq!(view.remaining_point, 10);

        tasks.shutdown(Duration::from_secs(1)).await;
    }
}
