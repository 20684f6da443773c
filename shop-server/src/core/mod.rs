//! 核心模块 - 配置、状态、后台任务和服务层错误
//!
//! - [`Config`] - 环境变量配置
//! - [`ShopState`] - 所有服务的共享引用
//! - [`BackgroundTasks`] - 后台任务生命周期
//! - [`ShopError`] - 服务层错误

pub mod config;
pub mod error;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{ShopError, ShopResult};
pub use state::{EventPipeline, ShopState};
pub use tasks::{BackgroundTasks, TaskCounts, TaskKind};
