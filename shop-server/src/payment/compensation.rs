//! Saga compensation log
//!
//! Only steps that actually completed are recorded, and they are undone in
//! reverse order. Each undo runs on its own; one failing does not stop the
//! rest. Failures are logged under target `compensation` and are not
//! retried, so operators must watch that target.

use super::orchestrator::SagaMutators;

/// A saga step that committed and may need undoing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletedStep {
    StockDecreased { product_id: i64, quantity: i64 },
    CouponUsed { user_coupon_id: i64 },
    PointUsed { user_id: i64, order_id: i64, amount: i64 },
}

#[derive(Debug, Default)]
pub struct CompensationLog {
    steps: Vec<CompletedStep>,
}

/// How the rollback went
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompensationOutcome {
    pub attempted: usize,
    pub failed: usize,
}

impl CompensationLog {
    pub fn record(&mut self, step: CompletedStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[CompletedStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undo every recorded step, newest first
    pub async fn compensate(self, order_id: i64, mutators: &SagaMutators) -> CompensationOutcome {
        let mut outcome = CompensationOutcome::default();
        for step in self.steps.into_iter().rev() {
            outcome.attempted += 1;
            let result = match &step {
                CompletedStep::PointUsed {
                    user_id,
                    order_id,
                    amount,
                } => mutators
                    .points
                    .refund_point(*user_id, *order_id, *amount)
                    .await
                    .map(drop),
                CompletedStep::CouponUsed { user_coupon_id } => mutators
                    .coupons
                    .cancel_use_coupon(*user_coupon_id)
                    .await
                    .map(drop),
                CompletedStep::StockDecreased {
                    product_id,
                    quantity,
                } => mutators
                    .stock
                    .increase_stock(*product_id, *quantity)
                    .await
                    .map(drop),
            };

            match result {
                Ok(()) => tracing::debug!(target: "compensation", order_id, ?step, "Compensated"),
                Err(e) => {
                    outcome.failed += 1;
                    tracing::error!(
                        target: "compensation",
                        order_id,
                        ?step,
                        error = %e,
                        "Compensation step failed, manual repair required"
                    );
                }
            }
        }
        outcome
    }
}
