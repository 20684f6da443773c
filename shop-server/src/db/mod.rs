//! Database Module
//!
//! Handles the SQLite connection pool, migrations and the independent
//! transaction facility used by the resource mutators.

pub mod repository;

use futures::future::BoxFuture;
use shared::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;

/// Database service owning the SQLite connection pool
#[derive(Clone)]
pub struct DbService {
    pub pool: SqlitePool,
}

impl DbService {
    /// Open (or create) the database at `database_url` with WAL mode and run migrations
    pub async fn new(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("Invalid database url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON")
            // 写冲突时等待 5s 而非立即失败
            .busy_timeout(std::time::Duration::from_secs(5))
            .optimize_on_close(true, None);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        tracing::info!("Database connection established (SQLite WAL, busy_timeout=5000ms)");

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database (tests, demos)
    ///
    /// Single connection that is never recycled: every connection to
    /// `sqlite::memory:` is a separate database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::database(format!("Invalid database url: {e}")))?
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .set_ignore_missing(true)
            .run(pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

/// Run `f` inside a brand-new transaction on its own pooled connection.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. The
/// transaction is never joined with anything the caller may have open, so a
/// later failure elsewhere cannot undo what was committed here; that is what
/// lets the payment saga compensate step by step.
///
/// The closure receives the connection and must return a boxed future
/// borrowing it:
///
/// ```ignore
/// with_fresh_tx(&pool, move |conn| Box::pin(async move {
///     let product = repository::product::find_by_id(&mut *conn, id).await?;
///     Ok(product)
/// })).await
/// ```
pub async fn with_fresh_tx<T, E, F>(pool: &SqlitePool, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, E>>,
    E: From<sqlx::Error>,
{
    let mut tx = pool.begin().await?;
    match f(&mut *tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Db(sqlx::Error),
        Abort,
    }

    impl From<sqlx::Error> for TestError {
        fn from(e: sqlx::Error) -> Self {
            TestError::Db(e)
        }
    }

    async fn count_users(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_tx_commits_on_ok() {
        let db = DbService::in_memory().await.unwrap();
        let id: Result<i64, TestError> = with_fresh_tx(&db.pool, |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO users (id, name, point, updated_at) VALUES (1, 'a', 0, 0)")
                    .execute(&mut *conn)
                    .await?;
                Ok(1)
            })
        })
        .await;
        assert_eq!(id.unwrap(), 1);
        assert_eq!(count_users(&db.pool).await, 1);
    }

    #[tokio::test]
    async fn fresh_tx_rolls_back_on_err() {
        let db = DbService::in_memory().await.unwrap();
        let result: Result<(), TestError> = with_fresh_tx(&db.pool, |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO users (id, name, point, updated_at) VALUES (1, 'a', 0, 0)")
                    .execute(&mut *conn)
                    .await?;
                Err(TestError::Abort)
            })
        })
        .await;
        assert!(matches!(result, Err(TestError::Abort)));
        assert_eq!(count_users(&db.pool).await, 0);
    }

    #[tokio::test]
    async fn earlier_commit_survives_later_failure() {
        let db = DbService::in_memory().await.unwrap();
        let first: Result<(), TestError> = with_fresh_tx(&db.pool, |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO users (id, name, point, updated_at) VALUES (1, 'a', 0, 0)")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .await;
        first.unwrap();

        let second: Result<(), TestError> = with_fresh_tx(&db.pool, |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO users (id, name, point, updated_at) VALUES (2, 'b', 0, 0)")
                    .execute(&mut *conn)
                    .await?;
                Err(TestError::Abort)
            })
        })
        .await;
        assert!(second.is_err());
        assert_eq!(count_users(&db.pool).await, 1);
    }
}
