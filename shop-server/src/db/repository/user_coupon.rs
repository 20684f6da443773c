//! UserCoupon Repository

use super::RepoResult;
use shared::models::UserCoupon;
use sqlx::{Executor, QueryBuilder, Sqlite};

const COLUMNS: &str = "id, user_id, coupon_id, status, version, issued_at, used_at";

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<UserCoupon>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM user_coupon WHERE id = ?");
    let row = sqlx::query_as::<_, UserCoupon>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_by_user_and_coupon<'e, E>(
    executor: E,
    user_id: i64,
    coupon_id: i64,
) -> RepoResult<Option<UserCoupon>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM user_coupon WHERE user_id = ? AND coupon_id = ?");
    let row = sqlx::query_as::<_, UserCoupon>(&sql)
        .bind(user_id)
        .bind(coupon_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Persist a status transition made on the model.
///
/// `expected_version` is the version the row had when it was loaded; the
/// write only lands if nobody bumped it since. Returns whether it landed.
pub async fn update_status<'e, E>(
    executor: E,
    user_coupon: &UserCoupon,
    expected_version: i64,
) -> RepoResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE user_coupon SET status = ?, used_at = ?, version = ? WHERE id = ? AND version = ?",
    )
    .bind(user_coupon.status)
    .bind(user_coupon.used_at)
    .bind(user_coupon.version)
    .bind(user_coupon.id)
    .bind(expected_version)
    .execute(executor)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

/// Which of `user_ids` already hold a row for `coupon_id`
pub async fn existing_user_ids<'e, E>(
    executor: E,
    coupon_id: i64,
    user_ids: &[i64],
) -> RepoResult<Vec<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT user_id FROM user_coupon WHERE coupon_id = ");
    qb.push_bind(coupon_id).push(" AND user_id IN (");
    let mut sep = qb.separated(", ");
    for id in user_ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
    let rows = qb.build_query_scalar::<i64>().fetch_all(executor).await?;
    Ok(rows)
}

/// Every user holding `coupon_id` (cache rebuild)
pub async fn user_ids_for_coupon<'e, E>(executor: E, coupon_id: i64) -> RepoResult<Vec<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_scalar::<_, i64>("SELECT user_id FROM user_coupon WHERE coupon_id = ?")
        .bind(coupon_id)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Bulk insert ISSUED rows for `user_ids`; returns how many were written
pub async fn insert_issued<'e, E>(
    executor: E,
    coupon_id: i64,
    user_ids: &[i64],
    issued_at: i64,
) -> RepoResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    if user_ids.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "INSERT INTO user_coupon (user_id, coupon_id, status, version, issued_at) ",
    );
    qb.push_values(user_ids, |mut row, user_id| {
        row.push_bind(*user_id)
            .push_bind(coupon_id)
            .push_bind("ISSUED")
            .push_bind(0_i64)
            .push_bind(issued_at);
    });
    let rows = qb.build().execute(executor).await?.rows_affected();
    Ok(rows)
}

pub async fn count_by_coupon<'e, E>(executor: E, coupon_id: i64) -> RepoResult<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_coupon WHERE coupon_id = ?")
        .bind(coupon_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}
