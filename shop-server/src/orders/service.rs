//! OrderService - PENDING order creation
//!
//! ```text
//! create_order(user, lines, coupon?)
//!     ├─ 1. Validate lines (non-empty, quantity > 0)
//!     ├─ 2. Load user, snapshot product prices, compute total
//!     ├─ 3. Validate coupon (owned, ISSUED, inside its validity window)
//!     ├─ 4. discount = coupon.calculate_discount(total)
//!     └─ 5. Insert order + items in one transaction
//! ```
//!
//! Nothing here reserves stock or touches the coupon status; that is the
//! payment saga's job.

use crate::core::{ShopError, ShopResult};
use crate::db::repository::order::{self, NewOrderItem};
use crate::db::repository::{coupon, product, user, user_coupon};
use crate::db::with_fresh_tx;
use serde::{Deserialize, Serialize};
use shared::models::{Order, OrderItem};
use sqlx::{SqliteConnection, SqlitePool};

/// One requested line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

/// A freshly created order with its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Clone)]
pub struct OrderService {
    pool: SqlitePool,
}

impl OrderService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a PENDING order for `user_id`
    pub async fn create_order(
        &self,
        user_id: i64,
        lines: &[OrderLine],
        user_coupon_id: Option<i64>,
    ) -> ShopResult<PlacedOrder> {
        if lines.is_empty() {
            return Err(ShopError::EmptyOrder);
        }
        if let Some(bad) = lines.iter().find(|l| l.quantity <= 0) {
            return Err(ShopError::InvalidQuantity(bad.quantity));
        }

        let lines = lines.to_vec();
        let placed = with_fresh_tx::<_, ShopError, _>(&self.pool, move |conn| {
            Box::pin(async move {
                user::find_by_id(&mut *conn, user_id)
                    .await?
                    .ok_or(ShopError::not_found("user", user_id))?;

                let items = snapshot_prices(conn, &lines).await?;
                let total = items.iter().try_fold(0i64, |acc, item| {
                    item.unit_price
                        .checked_mul(item.quantity)
                        .and_then(|subtotal| acc.checked_add(subtotal))
                        .ok_or(ShopError::InvalidAmount {
                            amount: acc,
                            reason: "order total overflows",
                        })
                })?;

                let discount = match user_coupon_id {
                    Some(id) => coupon_discount(conn, user_id, id, total).await?,
                    None => 0,
                };

                let now = shared::util::now_millis();
                let (order, items) =
                    order::create_with_items(conn, user_id, user_coupon_id, total, discount, &items, now)
                        .await?;
                Ok(PlacedOrder { order, items })
            })
        })
        .await?;

        tracing::info!(
            order_id = placed.order.id,
            user_id,
            total = placed.order.total_amount,
            discount = placed.order.discount_amount,
            "Order created"
        );
        Ok(placed)
    }

    /// Order header and lines
    pub async fn find_order(&self, order_id: i64) -> ShopResult<PlacedOrder> {
        let order = order::find_by_id(&self.pool, order_id)
            .await?
            .ok_or(ShopError::not_found("order", order_id))?;
        let items = order::find_items(&self.pool, order_id).await?;
        Ok(PlacedOrder { order, items })
    }
}

async fn snapshot_prices(conn: &mut SqliteConnection, lines: &[OrderLine]) -> ShopResult<Vec<NewOrderItem>> {
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let product = product::find_by_id(&mut *conn, line.product_id)
            .await?
            .ok_or(ShopError::not_found("product", line.product_id))?;
        items.push(NewOrderItem {
            product_id: product.id,
            quantity: line.quantity,
            unit_price: product.price,
        });
    }
    Ok(items)
}

async fn coupon_discount(
    conn: &mut SqliteConnection,
    user_id: i64,
    user_coupon_id: i64,
    total: i64,
) -> ShopResult<i64> {
    let issued = user_coupon::find_by_id(&mut *conn, user_coupon_id)
        .await?
        .ok_or(ShopError::not_found("user_coupon", user_coupon_id))?;
    if issued.user_id != user_id {
        return Err(ShopError::CouponNotOwned {
            user_coupon_id,
            user_id,
        });
    }
    if issued.is_used() {
        return Err(ShopError::CouponAlreadyUsed(user_coupon_id));
    }

    let coupon = coupon::find_by_id(&mut *conn, issued.coupon_id)
        .await?
        .ok_or(ShopError::CouponNotFound(issued.coupon_id))?;
    if !coupon.is_valid_at(shared::util::now_millis()) {
        return Err(ShopError::CouponExpired(coupon.id));
    }
    Ok(coupon.calculate_discount(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support;
    use shared::models::{Coupon, DiscountType, OrderStatus, Product, User};

    async fn service() -> OrderService {
        let pool = test_support::pool().await;
        product::create(&pool, &Product::new(2, "Mouse", 10, 5)).await.unwrap();
        product::create(&pool, &Product::new(5, "Cable", 10, 5)).await.unwrap();
        user::create(&pool, &User::new(1, "kim", 100)).await.unwrap();
        user::create(&pool, &User::new(2, "lee", 100)).await.unwrap();
        OrderService::new(pool)
    }

    async fn give_coupon(pool: &SqlitePool, coupon: Coupon, user_id: i64) -> i64 {
        let coupon_id = coupon.id;
        coupon::create(pool, &coupon).await.unwrap();
        user_coupon::insert_issued(pool, coupon_id, &[user_id], 0).await.unwrap();
        user_coupon::find_by_user_and_coupon(pool, user_id, coupon_id)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn snapshots_prices_and_totals() {
        let svc = service().await;
        let placed = svc
            .create_order(1, &[OrderLine::new(5, 3), OrderLine::new(2, 1)], None)
            .await
            .unwrap();
        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(placed.order.total_amount, 40);
        assert_eq!(placed.order.discount_amount, 0);
        assert_eq!(placed.items.len(), 2);
        assert!(placed.items.iter().all(|i| i.unit_price == 10));

        let found = svc.find_order(placed.order.id).await.unwrap();
        assert_eq!(found, placed);
    }

    #[tokio::test]
    async fn coupon_discount_is_applied() {
        let svc = service().await;
        let uc = give_coupon(
            &svc.pool,
            Coupon::new(1, "QUARTER", DiscountType::Percentage, 25, 10, 0, i64::MAX),
            1,
        )
        .await;
        let placed = svc
            .create_order(1, &[OrderLine::new(5, 4)], Some(uc))
            .await
            .unwrap();
        assert_eq!(placed.order.discount_amount, 10);
        assert_eq!(placed.order.final_amount(), 30);
        assert_eq!(placed.order.user_coupon_id, Some(uc));
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let svc = service().await;
        assert!(matches!(svc.create_order(1, &[], None).await, Err(ShopError::EmptyOrder)));
        assert!(matches!(
            svc.create_order(1, &[OrderLine::new(5, 0)], None).await,
            Err(ShopError::InvalidQuantity(0))
        ));
        assert!(matches!(
            svc.create_order(1, &[OrderLine::new(99, 1)], None).await,
            Err(ShopError::NotFound { entity: "product", id: 99 })
        ));
        assert!(matches!(
            svc.create_order(9, &[OrderLine::new(5, 1)], None).await,
            Err(ShopError::NotFound { entity: "user", id: 9 })
        ));
    }

    #[tokio::test]
    async fn rejects_foreign_and_expired_coupons() {
        let svc = service().await;
        let foreign = give_coupon(
            &svc.pool,
            Coupon::new(1, "TEN", DiscountType::Fixed, 10, 10, 0, i64::MAX),
            2,
        )
        .await;
        assert!(matches!(
            svc.create_order(1, &[OrderLine::new(5, 1)], Some(foreign)).await,
            Err(ShopError::CouponNotOwned { user_id: 1, .. })
        ));

        let expired = give_coupon(
            &svc.pool,
            Coupon::new(2, "OLD", DiscountType::Fixed, 10, 10, 0, 1_000),
            1,
        )
        .await;
        assert!(matches!(
            svc.create_order(1, &[OrderLine::new(5, 1)], Some(expired)).await,
            Err(ShopError::CouponExpired(2))
        ));
        assert!(matches!(
            svc.create_order(1, &[OrderLine::new(5, 1)], Some(404)).await,
            Err(ShopError::NotFound { entity: "user_coupon", id: 404 })
        ));
    }
}
