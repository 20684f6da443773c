//! Product Repository

use super::{RepoError, RepoResult};
use shared::models::Product;
use sqlx::{Executor, Sqlite};

const COLUMNS: &str =
    "id, name, price, stock_quantity, original_stock_quantity, view_count, created_at, updated_at";

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM product WHERE id = ?");
    let row = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn find_all<'e, E>(executor: E) -> RepoResult<Vec<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {COLUMNS} FROM product ORDER BY id");
    let rows = sqlx::query_as::<_, Product>(&sql).fetch_all(executor).await?;
    Ok(rows)
}

pub async fn create<'e, E>(executor: E, product: &Product) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO product (id, name, price, stock_quantity, original_stock_quantity, view_count, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.stock_quantity)
    .bind(product.original_stock_quantity)
    .bind(product.view_count)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Write back the stock counter of an already-mutated product.
///
/// Only the stock mutator calls this, while holding the product's lock.
pub async fn update_stock<'e, E>(executor: E, product: &Product) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("UPDATE product SET stock_quantity = ?, updated_at = ? WHERE id = ?")
        .bind(product.stock_quantity)
        .bind(product.updated_at)
        .bind(product.id)
        .execute(executor)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(RepoError::NotFound(format!("product {}", product.id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support;

    #[tokio::test]
    async fn create_then_update_stock() {
        let pool = test_support::pool().await;
        let mut p = Product::new(5, "Keyboard", 10, 3);
        create(&pool, &p).await.unwrap();

        p.decrease_stock(2).unwrap();
        update_stock(&pool, &p).await.unwrap();

        let loaded = find_by_id(&pool, 5).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 1);
        assert_eq!(loaded.original_stock_quantity, 3);
        assert_eq!(find_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_missing_product_is_not_found() {
        let pool = test_support::pool().await;
        let p = Product::new(99, "Ghost", 10, 3);
        assert!(matches!(update_stock(&pool, &p).await, Err(RepoError::NotFound(_))));
        assert!(find_by_id(&pool, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn negative_stock_is_rejected_by_schema() {
        let pool = test_support::pool().await;
        let mut p = Product::new(1, "Pad", 10, 1);
        create(&pool, &p).await.unwrap();
        p.stock_quantity = -1;
        assert!(matches!(update_stock(&pool, &p).await, Err(RepoError::Database(_))));
    }
}
