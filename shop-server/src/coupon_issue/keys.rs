//! Store keys of the admission pipeline, namespaced by coupon id

/// Set of coupon ids whose cache has been initialised
pub const COUPON_REGISTRY: &str = "coupon-issue:coupons";

/// Users accepted so far (persisted or still queued)
pub fn issued_users(coupon_id: i64) -> String {
    format!("coupon:{coupon_id}:issued-users")
}

/// Total quantity of the coupon
pub fn stock(coupon_id: i64) -> String {
    format!("coupon:{coupon_id}:stock")
}

/// FIFO of admission records waiting for the consumer
pub fn queue(coupon_id: i64) -> String {
    format!("coupon:{coupon_id}:queue")
}

/// Records that exhausted their delivery attempts
pub fn dead_letter(coupon_id: i64) -> String {
    format!("coupon:{coupon_id}:dead-letter")
}
