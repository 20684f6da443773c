//! Lock keys, one per contended entity
//!
//! Always scope by entity id; a shared key would serialize unrelated rows.

pub fn product_stock(product_id: i64) -> String {
    format!("product:{product_id}:stock")
}

pub fn user_coupon(user_coupon_id: i64) -> String {
    format!("userCoupon:{user_coupon_id}")
}

pub fn user_point(user_id: i64) -> String {
    format!("user:{user_id}:point")
}

pub fn order_payment(order_id: i64) -> String {
    format!("order:{order_id}:payment")
}
