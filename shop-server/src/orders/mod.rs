//! Order placement
//!
//! Creates PENDING orders with price snapshots and a pre-computed coupon
//! discount. Payment itself lives in [`crate::payment`].

mod service;

pub use service::{OrderLine, OrderService, PlacedOrder};
