//! Order Repository

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderItem, OrderStatus};
use sqlx::{Executor, Sqlite, SqliteConnection};

/// New order line before it has an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
}

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Order>(
        "SELECT id, user_id, user_coupon_id, total_amount, discount_amount, status, created_at, updated_at FROM orders WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_items<'e, E>(executor: E, order_id: i64) -> RepoResult<Vec<OrderItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, product_id, quantity, unit_price FROM order_item WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

/// Insert a PENDING order together with its lines.
///
/// Takes a connection because it issues several statements; run it inside a
/// transaction so the order never exists without its items.
pub async fn create_with_items(
    conn: &mut SqliteConnection,
    user_id: i64,
    user_coupon_id: Option<i64>,
    total_amount: i64,
    discount_amount: i64,
    items: &[NewOrderItem],
    now: i64,
) -> RepoResult<(Order, Vec<OrderItem>)> {
    let order_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO orders (user_id, user_coupon_id, total_amount, discount_amount, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(user_id)
    .bind(user_coupon_id)
    .bind(total_amount)
    .bind(discount_amount)
    .bind(OrderStatus::Pending)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let mut created = Vec::with_capacity(items.len());
    for item in items {
        let item_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO order_item (order_id, product_id, quantity, unit_price) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .fetch_one(&mut *conn)
        .await?;
        created.push(OrderItem {
            id: item_id,
            order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        });
    }

    let order = Order {
        id: order_id,
        user_id,
        user_coupon_id,
        total_amount,
        discount_amount,
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    Ok((order, created))
}

/// Persist a terminal transition; only a row still PENDING is updated.
pub async fn update_status<'e, E>(executor: E, order: &Order) -> RepoResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = 'PENDING'")
        .bind(order.status)
        .bind(order.updated_at)
        .bind(order.id)
        .execute(executor)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(RepoError::Validation(format!(
            "order {} is no longer PENDING",
            order.id
        )));
    }
    Ok(())
}
