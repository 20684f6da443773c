//! Admission record carried by the queue

use super::kv::KvError;
use serde::{Deserialize, Serialize};

/// One accepted request, waiting to become a `user_coupon` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub user_id: i64,
    pub coupon_id: i64,
    pub accepted_at: i64,
    /// Failed persistence attempts so far
    #[serde(default)]
    pub attempts: u32,
}

impl AdmissionRecord {
    pub fn new(user_id: i64, coupon_id: i64, accepted_at: i64) -> Self {
        Self {
            user_id,
            coupon_id,
            accepted_at,
            attempts: 0,
        }
    }

    pub fn encode(&self) -> Result<String, KvError> {
        serde_json::to_string(self).map_err(|e| KvError::Malformed {
            key: super::keys::queue(self.coupon_id),
            reason: e.to_string(),
        })
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Same record, one more failed attempt
    pub fn retried(&self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self.clone()
        }
    }
}
