//! User Repository (point account)

use super::{RepoError, RepoResult};
use shared::models::User;
use sqlx::{Executor, Sqlite};

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, User>("SELECT id, name, point, updated_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn create<'e, E>(executor: E, user: &User) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO users (id, name, point, updated_at) VALUES (?, ?, ?, ?)")
        .bind(user.id)
        .bind(&user.name)
        .bind(user.point)
        .bind(user.updated_at)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn update_point<'e, E>(executor: E, user: &User) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("UPDATE users SET point = ?, updated_at = ? WHERE id = ?")
        .bind(user.point)
        .bind(user.updated_at)
        .bind(user.id)
        .execute(executor)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(RepoError::NotFound(format!("user {}", user.id)));
    }
    Ok(())
}
