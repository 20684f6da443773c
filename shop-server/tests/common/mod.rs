#![allow(dead_code)]

use shop_server::core::EventPipeline;
use shop_server::db::repository::{coupon, product, user, user_coupon};
use shop_server::{Config, ShopState};
use shared::models::{Coupon, DiscountType, Product, User};

/// In-memory checkout core; keep the pipeline alive so events are not dropped
pub async fn state() -> (ShopState, EventPipeline) {
    ShopState::initialize(&Config::for_tests()).await.unwrap()
}

pub async fn add_product(state: &ShopState, id: i64, price: i64, stock: i64) {
    product::create(&state.db.pool, &Product::new(id, format!("product-{id}"), price, stock))
        .await
        .unwrap();
}

pub async fn add_user(state: &ShopState, id: i64, point: i64) {
    user::create(&state.db.pool, &User::new(id, format!("user-{id}"), point))
        .await
        .unwrap();
}

pub async fn add_coupon(state: &ShopState, id: i64, discount_type: DiscountType, value: i64, total: i64) {
    coupon::create(
        &state.db.pool,
        &Coupon::new(id, format!("coupon-{id}"), discount_type, value, total, 0, i64::MAX),
    )
    .await
    .unwrap();
}

/// Issue `coupon_id` to `user_id` directly and return the user_coupon id
pub async fn give_coupon(state: &ShopState, coupon_id: i64, user_id: i64) -> i64 {
    user_coupon::insert_issued(&state.db.pool, coupon_id, &[user_id], 0)
        .await
        .unwrap();
    user_coupon::find_by_user_and_coupon(&state.db.pool, user_id, coupon_id)
        .await
        .unwrap()
        .unwrap()
        .id
}

pub async fn stock_of(state: &ShopState, product_id: i64) -> i64 {
    product::find_by_id(&state.db.pool, product_id)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

pub async fn point_of(state: &ShopState, user_id: i64) -> i64 {
    user::find_by_id(&state.db.pool, user_id).await.unwrap().unwrap().point
}
