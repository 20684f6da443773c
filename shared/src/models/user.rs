//! User Model (point account)

use super::DomainError;
use serde::{Deserialize, Serialize};

/// User entity. `point` is written exclusively by the point mutator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub name: String,
    pub point: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>, point: i64) -> Self {
        Self {
            id,
            name: name.into(),
            point,
            updated_at: crate::util::now_millis(),
        }
    }

    pub fn use_point(&mut self, amount: i64) -> Result<(), DomainError> {
        ensure_positive(amount)?;
        if self.point < amount {
            return Err(DomainError::InsufficientPoint {
                user_id: self.id,
                balance: self.point,
                requested: amount,
            });
        }
        self.point -= amount;
        self.touch();
        Ok(())
    }

    /// Top-up; only whole multiples of `unit` are accepted
    pub fn charge_point(&mut self, amount: i64, unit: i64) -> Result<(), DomainError> {
        ensure_positive(amount)?;
        if unit > 0 && amount % unit != 0 {
            return Err(DomainError::InvalidAmount {
                amount,
                reason: "charge must be a multiple of the charge unit",
            });
        }
        self.add(amount)
    }

    /// Give back points taken by a failed payment. No unit rule applies.
    pub fn refund_point(&mut self, amount: i64) -> Result<(), DomainError> {
        ensure_positive(amount)?;
        self.add(amount)
    }

    fn add(&mut self, amount: i64) -> Result<(), DomainError> {
        self.point = self.point.checked_add(amount).ok_or(DomainError::InvalidAmount {
            amount,
            reason: "balance overflow",
        })?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = crate::util::now_millis();
    }
}

fn ensure_positive(amount: i64) -> Result<(), DomainError> {
    if amount <= 0 {
        return Err(DomainError::InvalidAmount {
            amount,
            reason: "amount must be positive",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_point_rejects_overdraw() {
        let mut u = User::new(1, "kim", 30);
        assert!(matches!(
            u.use_point(40),
            Err(DomainError::InsufficientPoint { balance: 30, requested: 40, .. })
        ));
        assert_eq!(u.point, 30);
        u.use_point(30).unwrap();
        assert_eq!(u.point, 0);
    }

    #[test]
    fn charge_requires_unit_multiple() {
        let mut u = User::new(1, "kim", 0);
        assert!(matches!(
            u.charge_point(1_500, 1_000),
            Err(DomainError::InvalidAmount { amount: 1_500, .. })
        ));
        u.charge_point(3_000, 1_000).unwrap();
        assert_eq!(u.point, 3_000);
    }

    #[test]
    fn refund_ignores_unit_rule() {
        let mut u = User::new(1, "kim", 0);
        u.refund_point(40).unwrap();
        assert_eq!(u.point, 40);
    }

    #[test]
    fn non_positive_amounts_are_invalid() {
        let mut u = User::new(1, "kim", 100);
        assert!(u.use_point(0).is_err());
        assert!(u.charge_point(-1_000, 1_000).is_err());
        assert!(u.refund_point(0).is_err());
        assert_eq!(u.point, 100);
    }
}
