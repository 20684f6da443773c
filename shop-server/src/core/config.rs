use crate::lock::LockOptions;
use std::str::FromStr;
use std::time::Duration;

/// 服务配置 - checkout 核心的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_URL | sqlite:shop.db | 关系库 |
/// | REDIS_URL | (未设置) | 设置且启用 `redis` feature 时锁与缓存走 Redis |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 设置后按天滚动写文件 |
/// | LOCK_WAIT_MS | 5000 | 默认锁等待 |
/// | LOCK_LEASE_MS | 3000 | 默认锁租约 |
/// | PAYMENT_LOCK_LEASE_MS | 60000 | 订单支付锁租约，须覆盖整个 Saga |
/// | POINT_CHARGE_UNIT | 1000 | 充值金额必须是它的倍数 |
/// | ISSUE_BATCH_SIZE | 100 | 发券消费者单次弹出上限 |
/// | ISSUE_CONSUMER_INTERVAL_MS | 1000 | 发券消费者周期 |
/// | ISSUE_MAX_DELIVERY_ATTEMPTS | 5 | 超过后进入死信 |
/// | NOTIFICATION_WEBHOOK_URL | (未设置) | 未设置时只记日志 |
/// | EVENT_CHANNEL_CAPACITY | 1024 | 支付事件通道容量 |
///
/// # 示例
///
/// ```ignore
/// DATABASE_URL=sqlite:/data/shop.db LOCK_WAIT_MS=2000 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    /// 日志目录，None 表示只输出到控制台
    pub log_dir: Option<String>,

    pub lock_wait_ms: u64,
    pub lock_lease_ms: u64,
    /// 支付期间一直持有 `order:{id}:payment`，租约要长于所有实体锁等待之和
    pub payment_lock_lease_ms: u64,
    pub point_charge_unit: i64,

    // === 发券流水线 ===
    pub issue_batch_size: usize,
    pub issue_consumer_interval_ms: u64,
    pub issue_max_delivery_attempts: u32,

    // === 支付副作用 ===
    pub notification_webhook_url: Option<String>,
    pub event_channel_capacity: usize,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的变量使用默认值
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:shop.db".into()),
            redis_url: env_opt("REDIS_URL"),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
            lock_wait_ms: env_or("LOCK_WAIT_MS", 5_000),
            lock_lease_ms: env_or("LOCK_LEASE_MS", 3_000),
            payment_lock_lease_ms: env_or("PAYMENT_LOCK_LEASE_MS", 60_000),
            point_charge_unit: env_or("POINT_CHARGE_UNIT", crate::mutation::DEFAULT_CHARGE_UNIT),
            issue_batch_size: env_or("ISSUE_BATCH_SIZE", crate::coupon_issue::DEFAULT_BATCH_SIZE),
            issue_consumer_interval_ms: env_or("ISSUE_CONSUMER_INTERVAL_MS", 1_000),
            issue_max_delivery_attempts: env_or(
                "ISSUE_MAX_DELIVERY_ATTEMPTS",
                crate::coupon_issue::DEFAULT_MAX_DELIVERY_ATTEMPTS,
            ),
            notification_webhook_url: env_opt("NOTIFICATION_WEBHOOK_URL"),
            event_channel_capacity: env_or("EVENT_CHANNEL_CAPACITY", 1_024),
        }
    }

    /// 测试用配置：内存库、本地锁、短超时
    ///
    /// 不读取任何环境变量
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            redis_url: None,
            environment: "test".into(),
            log_level: "debug".into(),
            log_dir: None,
            lock_wait_ms: 2_000,
            lock_lease_ms: 3_000,
            payment_lock_lease_ms: 60_000,
            point_charge_unit: crate::mutation::DEFAULT_CHARGE_UNIT,
            issue_batch_size: crate::coupon_issue::DEFAULT_BATCH_SIZE,
            issue_consumer_interval_ms: 50,
            issue_max_delivery_attempts: crate::coupon_issue::DEFAULT_MAX_DELIVERY_ATTEMPTS,
            notification_webhook_url: None,
            event_channel_capacity: 64,
        }
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions::new(
            Duration::from_millis(self.lock_wait_ms),
            Duration::from_millis(self.lock_lease_ms),
        )
    }

    /// 订单支付锁租约，不短于实体锁租约
    pub fn payment_lock_lease(&self) -> Duration {
        Duration::from_millis(self.payment_lock_lease_ms.max(self.lock_lease_ms))
    }

    pub fn issue_consumer_interval(&self) -> Duration {
        Duration::from_millis(self.issue_consumer_interval_ms.max(1))
    }

    /// 是否内存数据库
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
