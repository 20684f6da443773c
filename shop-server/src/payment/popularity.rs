//! Product popularity ranking (sorted set `product:popularity`)
//!
//! Each confirmed line adds `quantity / original_stock_quantity` to the
//! product's score, so selling out a small batch counts as much as selling
//! out a large one.

use crate::core::ShopResult;
use crate::coupon_issue::KvStore;
use crate::db::repository::product;
use shared::models::OrderItem;
use sqlx::SqlitePool;
use std::sync::Arc;

pub const POPULARITY_KEY: &str = "product:popularity";

#[derive(Clone)]
pub struct PopularityRanking {
    pool: SqlitePool,
    kv: Arc<dyn KvStore>,
}

impl PopularityRanking {
    pub fn new(pool: SqlitePool, kv: Arc<dyn KvStore>) -> Self {
        Self { pool, kv }
    }

    pub async fn record_order(&self, items: &[OrderItem]) -> ShopResult<()> {
        for item in items {
            let Some(p) = product::find_by_id(&self.pool, item.product_id).await? else {
                tracing::warn!(product_id = item.product_id, "Product vanished, skipping popularity");
                continue;
            };
            let weight = p.popularity_weight(item.quantity);
            if weight > 0.0 {
                self.kv
                    .sorted_incr(POPULARITY_KEY, &p.id.to_string(), weight)
                    .await?;
            }
        }
        Ok(())
    }

    /// `(product_id, score)`, most popular first
    pub async fn top(&self, limit: usize) -> ShopResult<Vec<(i64, f64)>> {
        let ranked = self.kv.sorted_top(POPULARITY_KEY, limit).await?;
        Ok(ranked
            .into_iter()
            .filter_map(|(member, score)| member.parse().ok().map(|id| (id, score)))
            .collect())
    }
}
