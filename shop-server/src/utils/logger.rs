//! Logging Infrastructure
//!
//! - Console output, pretty in development and JSON in production
//! - Daily rotating application logs (deleted after 14 days)
//! - Permanent compensation logs: saga rollbacks that failed and need a human

use crate::core::Config;
use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Target of saga compensation records
pub const COMPENSATION_TARGET: &str = "compensation";

const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console only, level from `RUST_LOG` or `info`
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file("info", false, None)
}

/// Initialize logging from the service configuration
///
/// `log_level` is the default filter, production switches the console to
/// JSON, and `log_dir` enables the file layers.
pub fn init_logger_from_config(config: &Config) -> anyhow::Result<()> {
    init_logger_with_file(&config.log_level, config.is_production(), config.log_dir.as_deref())
}

/// Initialize logging
///
/// # Arguments
/// * `level` - default filter when `RUST_LOG` is unset (e.g. "info", "debug")
/// * `json_format` - JSON lines instead of the pretty format
/// * `log_dir` - when set, also write `app/` (rotated) and `compensation/` (kept) files
///
/// ```ignore
/// // Development (console only)
/// init_logger_with_file("debug", false, None)?;
/// // Production (console + files)
/// init_logger_with_file("info", true, Some("./logs"))?;
/// ```
pub fn init_logger_with_file(level: &str, json_format: bool, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer> = vec![console_layer(json_format)];

    if let Some(dir) = log_dir {
        let log_dir = Path::new(dir);
        let app_log_dir = log_dir.join("app");
        let compensation_log_dir = log_dir.join(COMPENSATION_TARGET);
        fs::create_dir_all(&app_log_dir)?;
        fs::create_dir_all(&compensation_log_dir)?;

        let app_log = RollingFileAppender::new(Rotation::DAILY, app_log_dir, "app");
        layers.push(
            file_layer(app_log, json_format)
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() != COMPENSATION_TARGET
                }))
                .boxed(),
        );

        let compensation_log = RollingFileAppender::new(Rotation::DAILY, compensation_log_dir, COMPENSATION_TARGET);
        layers.push(
            file_layer(compensation_log, true)
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() == COMPENSATION_TARGET
                }))
                .boxed(),
        );

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(periodic_cleanup(log_dir.to_path_buf()));
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;
    Ok(())
}

fn console_layer(json_format: bool) -> BoxedLayer {
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    }
}

fn file_layer(appender: RollingFileAppender, json_format: bool) -> BoxedLayer {
    let writer = std::sync::Mutex::new(appender);
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(writer)
            .boxed()
    }
}

/// Delete `app/app.YYYY-MM-DD` files older than the retention window.
///
/// Compensation logs are never touched.
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<usize> {
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(APP_LOG_RETENTION_DAYS);
    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // RollingFileAppender 命名: app.2025-01-31
        if let Some(date_part) = name.strip_prefix("app.")
            && let Ok(date) = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }
    Ok(removed)
}

async fn periodic_cleanup(log_dir: std::path::PathBuf) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
    loop {
        ticker.tick().await;
        if let Err(e) = cleanup_old_logs(&log_dir) {
            tracing::warn!(error = %e, "Log cleanup failed");
        }
    }
}
