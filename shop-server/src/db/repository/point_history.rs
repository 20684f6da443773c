//! PointHistory Repository (append-only, no update/delete)

use super::RepoResult;
use shared::models::{NewPointHistory, PointHistory};
use sqlx::{Executor, Sqlite};

pub async fn insert<'e, E>(executor: E, entry: &NewPointHistory, created_at: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO point_history (user_id, order_id, transaction_type, amount, balance_after, created_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(entry.user_id)
    .bind(entry.order_id)
    .bind(entry.transaction_type)
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(created_at)
    .fetch_one(executor)
    .await?;
    Ok(id)
}

/// Ledger of one user, oldest first
pub async fn find_by_user<'e, E>(executor: E, user_id: i64) -> RepoResult<Vec<PointHistory>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, PointHistory>(
        "SELECT id, user_id, order_id, transaction_type, amount, balance_after, created_at FROM point_history WHERE user_id = ? ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support;
    use shared::models::{PointTransactionType, User};

    #[tokio::test]
    async fn insert_keeps_order_and_type() {
        let pool = test_support::pool().await;
        let u = User::new(3, "lee", 1_000);
        let charge = NewPointHistory::after(&u, None, PointTransactionType::Charge, 1_000);
        insert(&pool, &charge, 1).await.unwrap();
        let used = NewPointHistory { balance_after: 960, ..NewPointHistory::after(&u, Some(9), PointTransactionType::Use, 40) };
        insert(&pool, &used, 2).await.unwrap();

        let rows = find_by_user(&pool, 3).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction_type, PointTransactionType::Charge);
        assert_eq!(rows[0].order_id, None);
        assert_eq!(rows[1].transaction_type, PointTransactionType::Use);
        assert_eq!(rows[1].order_id, Some(9));
        assert_eq!(rows[1].balance_after, 960);
        assert!(find_by_user(&pool, 4).await.unwrap().is_empty());
    }
}
