//! Coupon admission pipeline
//!
//! ```text
//! issue() ──► set-add / stock check / queue push   (KvStore, non-blocking)
//!                               │
//!            IssueConsumer (periodic) ──► user_coupon rows + issued_quantity
//! ```
//!
//! The store is authoritative for admission decisions, the relational
//! tables for issued coupons once the consumer has run.
//! [`CouponCacheInitializer`] reconciles the two.

mod admission;
mod cache;
mod consumer;
pub mod keys;
mod kv;
mod record;
#[cfg(feature = "redis")]
mod redis_kv;

pub use admission::CouponAdmission;
pub use cache::CouponCacheInitializer;
pub use consumer::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_DELIVERY_ATTEMPTS, DrainReport, IssueConsumer};
pub use kv::{KvError, KvResult, KvStore, MemoryKvStore};
pub use record::AdmissionRecord;
#[cfg(feature = "redis")]
pub use redis_kv::RedisKvStore;
