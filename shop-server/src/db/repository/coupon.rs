//! Coupon Repository

use super::{RepoError, RepoResult};
use shared::models::Coupon;
use sqlx::{Executor, Sqlite};

const COLUMNS: &str = "id, name, discount_type, discount_value, total_quantity, issued_quantity, valid_from, valid_until, created_at";

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<Coupon>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM coupon WHERE id = ?");
    let row = sqlx::query_as::<_, Coupon>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_all<'e, E>(executor: E) -> RepoResult<Vec<Coupon>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM coupon ORDER BY id");
    let rows = sqlx::query_as::<_, Coupon>(&sql).fetch_all(executor).await?;
    Ok(rows)
}

pub async fn create<'e, E>(executor: E, coupon: &Coupon) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO coupon (id, name, discount_type, discount_value, total_quantity, issued_quantity, valid_from, valid_until, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(coupon.id)
    .bind(&coupon.name)
    .bind(coupon.discount_type)
    .bind(coupon.discount_value)
    .bind(coupon.total_quantity)
    .bind(coupon.issued_quantity)
    .bind(coupon.valid_from)
    .bind(coupon.valid_until)
    .bind(coupon.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// `issued_quantity += count`, refused if it would pass `total_quantity`
pub async fn add_issued_quantity<'e, E>(executor: E, id: i64, count: i64) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE coupon SET issued_quantity = issued_quantity + ?1 WHERE id = ?2 AND issued_quantity + ?1 <= total_quantity",
    )
    .bind(count)
    .bind(id)
    .execute(executor)
    .await?
    .rows_affected();
    if rows == 0 {
        return Err(RepoError::Validation(format!(
            "coupon {id}: cannot issue {count} more (missing or over total)"
        )));
    }
    Ok(())
}
