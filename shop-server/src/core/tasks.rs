//! 后台任务管理
//!
//! # 任务类型
//!
//! - [`TaskKind::Warmup`] - 启动预热，注册时就地执行一次（缓存重建）
//! - [`TaskKind::Worker`] - 长期后台工作者（支付事件）
//! - [`TaskKind::Periodic`] - 定时任务（发券消费者）

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Warmup,
    Worker,
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Warmup => "Warmup",
            TaskKind::Worker => "Worker",
            TaskKind::Periodic => "Periodic",
        };
        f.write_str(name)
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 按类型统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub warmup: usize,
    pub worker: usize,
    pub periodic: usize,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// 后台任务管理器
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.run_warmup("coupon_cache_init", async { cache.init_all().await.map(drop) }).await;
/// let token = tasks.shutdown_token();
/// tasks.spawn("issue_consumer", TaskKind::Periodic, consumer.run(period, token));
/// tasks.shutdown(Duration::from_secs(10)).await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    warmups_run: usize,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            warmups_run: 0,
            shutdown: CancellationToken::new(),
        }
    }

    /// 取消令牌（任务内部监听 shutdown 信号）
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 就地执行一次预热任务
    ///
    /// 预热失败或 panic 只记日志，不阻止启动。返回是否成功。
    pub async fn run_warmup<F, E>(&mut self, name: &'static str, future: F) -> bool
    where
        F: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        self.warmups_run += 1;
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => {
                tracing::info!(task = %name, "Warmup completed");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(task = %name, error = %e, "Warmup failed");
                false
            }
            Err(panic) => {
                tracing::error!(task = %name, panic = %panic_message(panic.as_ref()), "Warmup panicked");
                false
            }
        }
    }

    /// 注册并启动一个长期任务
    ///
    /// 任务被包装以捕获 panic；在 shutdown 之前退出会记录警告。
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let wrapped = async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) if shutdown.is_cancelled() => {}
                Ok(()) => {
                    tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                }
                Err(panic) => {
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_message(panic.as_ref()),
                        "Background task panicked"
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts {
            warmup: self.warmups_run,
            ..TaskCounts::default()
        };
        for task in &self.tasks {
            match task.kind {
                TaskKind::Warmup => counts.warmup += 1,
                TaskKind::Worker => counts.worker += 1,
                TaskKind::Periodic => counts.periodic += 1,
            }
        }
        counts
    }

    pub fn log_summary(&self) {
        let counts = self.counts();
        tracing::info!(
            total = self.tasks.len(),
            worker = counts.worker,
            periodic = counts.periodic,
            warmup = counts.warmup,
            "Background tasks registered"
        );
    }

    /// 返回已经退出的长期任务数量
    pub fn check_health(&self) -> usize {
        let finished = self.tasks.iter().filter(|t| t.handle.is_finished()).count();
        for task in self.tasks.iter().filter(|t| t.handle.is_finished()) {
            tracing::error!(task = %task.name, kind = %task.kind, "Background task is no longer running");
        }
        finished
    }

    /// Graceful shutdown - 发出取消信号，在 `timeout` 内等待所有任务退出
    ///
    /// 超时仍未退出的任务被 abort。
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!(count = self.tasks.len(), "Shutting down background tasks");
        self.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        for task in self.tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout_at(deadline, task.handle).await {
                Ok(Ok(())) => tracing::debug!(task = %task.name, "Task stopped"),
                Ok(Err(e)) => tracing::error!(task = %task.name, error = ?e, "Task join failed"),
                Err(_) => {
                    tracing::warn!(task = %task.name, "Task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
