use shop_server::{BackgroundTasks, ShopState, setup_environment};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 配置, 日志)
    let config = setup_environment()?;

    // 2. 启动
    tracing::info!(environment = %config.environment, "Shop server starting...");

    // 3. 初始化服务状态
    let (state, events) = ShopState::initialize(&config).await?;

    // 4. 启动后台任务 (缓存预热、发券消费者、支付事件)
    let mut tasks = BackgroundTasks::new();
    state.start_background_tasks(&mut tasks, events).await;

    // 5. 等待退出信号
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    tasks.shutdown(Duration::from_secs(10)).await;
    tracing::info!("Shop server stopped");
    Ok(())
}
