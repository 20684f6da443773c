//! PointHistory Model (积分流水, append-only)

use super::User;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum PointTransactionType {
    Charge,
    Use,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct PointHistory {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub transaction_type: PointTransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub created_at: i64,
}

/// Ledger row to append; `balance_after` is taken from the already-mutated user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPointHistory {
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub transaction_type: PointTransactionType,
    pub amount: i64,
    pub balance_after: i64,
}

impl NewPointHistory {
    pub fn after(
        user: &User,
        order_id: Option<i64>,
        transaction_type: PointTransactionType,
        amount: i64,
    ) -> Self {
        Self {
            user_id: user.id,
            order_id,
            transaction_type,
            amount,
            balance_after: user.point,
        }
    }
}
