//! Shop Server - checkout 资源变更核心
//!
//! # 架构概述
//!
//! - **锁** (`lock`): 按实体键的分布式锁，带等待超时和租约
//! - **资源变更** (`mutation`): 库存、优惠券使用、积分，各自独立事务
//! - **支付** (`payment`): Saga 编排，失败时逆序补偿
//! - **发券** (`coupon_issue`): 缓存准入 + 周期批量落库
//! - **数据库** (`db`): SQLite (sqlx) 连接池、迁移、仓储函数
//!
//! # 模块结构
//!
//! ```text
//! shop-server/src/
//! ├── core/          # 配置、状态、后台任务、服务层错误
//! ├── db/            # 连接池、事务、仓储
//! ├── lock/          # LockManager (本地 / Redis)
//! ├── mutation/      # Stock / CouponUse / Point 变更器
//! ├── payment/       # 支付编排、补偿、支付事件
//! ├── coupon_issue/  # 发券准入、缓存重建、批量消费者
//! ├── orders/        # 下单
//! └── utils/         # 日志
//! ```

pub mod core;
pub mod coupon_issue;
pub mod db;
pub mod lock;
pub mod mutation;
pub mod orders;
pub mod payment;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{BackgroundTasks, Config, ShopError, ShopResult, ShopState, TaskKind};
pub use coupon_issue::{CouponAdmission, CouponCacheInitializer, IssueConsumer, KvStore, MemoryKvStore};
pub use db::DbService;
pub use lock::{LocalLockManager, LockManager, LockOptions};
pub use mutation::{CouponUseMutator, PointMutator, StockMutator};
pub use orders::{OrderLine, OrderService};
pub use payment::{ConfirmedOrderView, PaymentOrchestrator};

// Re-export unified error types from shared
pub use shared::error::{AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_from_config, init_logger_with_file};

/// 加载 `.env`、读取配置并按配置初始化日志
///
/// `.env` 不存在不算错误。生产环境输出 JSON 日志。
pub fn setup_environment() -> anyhow::Result<Config> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    init_logger_from_config(&config)?;
    Ok(config)
}
