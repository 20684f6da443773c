//! Stock mutator (`product:{id}:stock`)

use super::MutationContext;
use crate::core::{ShopError, ShopResult};
use crate::db::repository::product;
use crate::db::with_fresh_tx;
use crate::lock::{keys, with_lock};
use shared::models::{DomainError, Product};

#[derive(Clone)]
pub struct StockMutator {
    ctx: MutationContext,
}

impl StockMutator {
    pub fn new(ctx: MutationContext) -> Self {
        Self { ctx }
    }

    /// Take `quantity` units; fails `InsufficientStock` with stock unchanged
    pub async fn decrease_stock(&self, product_id: i64, quantity: i64) -> ShopResult<Product> {
        let product = self.mutate(product_id, quantity, Product::decrease_stock).await?;
        tracing::debug!(product_id, quantity, stock = product.stock_quantity, "Stock decreased");
        Ok(product)
    }

    /// Put `quantity` units back (compensation path)
    pub async fn increase_stock(&self, product_id: i64, quantity: i64) -> ShopResult<Product> {
        let product = self.mutate(product_id, quantity, Product::increase_stock).await?;
        tracing::debug!(product_id, quantity, stock = product.stock_quantity, "Stock increased");
        Ok(product)
    }

    async fn mutate(
        &self,
        product_id: i64,
        quantity: i64,
        apply: fn(&mut Product, i64) -> Result<(), DomainError>,
    ) -> ShopResult<Product> {
        let key = keys::product_stock(product_id);
        with_lock(self.ctx.locks.as_ref(), &key, self.ctx.lock_options, || {
            with_fresh_tx::<_, ShopError, _>(&self.ctx.pool, move |conn| {
                Box::pin(async move {
                    let mut product = product::find_by_id(&mut *conn, product_id)
                        .await?
                        .ok_or(ShopError::not_found("product", product_id))?;
                    apply(&mut product, quantity)?;
                    product::update_stock(&mut *conn, &product).await?;
                    Ok(product)
                })
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::test_support;

    async fn seeded(stock: i64) -> StockMutator {
        let ctx = test_support::context().await;
        product::create(&ctx.pool, &Product::new(1, "Keyboard", 10, stock))
            .await
            .unwrap();
        StockMutator::new(ctx)
    }

    async fn stock_of(m: &StockMutator) -> i64 {
        product::find_by_id(&m.ctx.pool, 1)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }

    #[tokio::test]
    async fn decrease_then_increase() {
        let m = seeded(5).await;
        assert_eq!(m.decrease_stock(1, 3).await.unwrap().stock_quantity, 2);
        assert_eq!(m.increase_stock(1, 3).await.unwrap().stock_quantity, 5);
        assert_eq!(stock_of(&m).await, 5);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_row_unchanged() {
        let m = seeded(2).await;
        let err = m.decrease_stock(1, 3).await.unwrap_err();
        assert!(matches!(
            err,
            ShopError::InsufficientStock {
                product_id: 1,
                available: 2,
                requested: 3
            }
        ));
        assert_eq!(stock_of(&m).await, 2);
    }

    #[tokio::test]
    async fn increase_has_no_upper_bound() {
        let m = seeded(1).await;
        assert_eq!(m.increase_stock(1, 100).await.unwrap().stock_quantity, 101);
    }

    #[tokio::test]
    async fn overflowing_increase_is_rejected_and_row_unchanged() {
        let m = seeded(1).await;
        assert!(matches!(
            m.increase_stock(1, i64::MAX).await,
            Err(ShopError::InvalidQuantity(i64::MAX))
        ));
        assert_eq!(stock_of(&m).await, 1);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let m = seeded(1).await;
        assert!(matches!(
            m.decrease_stock(404, 1).await,
            Err(ShopError::NotFound { entity: "product", id: 404 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decreases_never_oversell() {
        let m = seeded(10).await;
        let mut handles = Vec::new();
        for _ in 0..25 {
            let m = m.clone();
            handles.push(tokio::spawn(async move { m.decrease_stock(1, 1).await }));
        }

        let mut ok = 0;
        let mut rejected = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(ShopError::InsufficientStock { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 10);
        assert_eq!(rejected, 15);
        assert_eq!(stock_of(&m).await, 0);
    }
}
