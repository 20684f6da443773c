//! Shared types for the shop checkout core
//!
//! Domain models with their invariants, the unified error-code system and
//! small utilities used by `shop-server` and any upper (CRUD/HTTP) layer.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use models::DomainError;
