//! Post-payment side effects
//!
//! ```text
//! PaymentOrchestrator ── try_send ──► mpsc ──► PaymentEventWorker
//!                                                 ├── PopularityRanking
//!                                                 └── NotificationSink
//! ```
//!
//! Best-effort: a full or closed channel drops the event with a warning,
//! and nothing the worker does can reach back into the payment result.

use super::notification::NotificationSink;
use super::popularity::PopularityRanking;
use futures::FutureExt;
use serde::Serialize;
use shared::models::{Order, OrderItem};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Result of a successful payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedOrderView {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub final_amount: i64,
    /// Point balance right after the payment
    pub remaining_point: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentEvent {
    OrderConfirmed(ConfirmedOrderView),
}

impl PaymentEvent {
    pub fn order_id(&self) -> i64 {
        match self {
            PaymentEvent::OrderConfirmed(view) => view.order.id,
        }
    }
}

/// Sending half handed to the orchestrator
#[derive(Clone)]
pub struct PaymentEventPublisher {
    tx: mpsc::Sender<PaymentEvent>,
}

impl PaymentEventPublisher {
    /// Create a publisher and the receiver its worker consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PaymentEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Never blocks; dropping is logged, not reported
    pub fn publish(&self, event: PaymentEvent) {
        let order_id = event.order_id();
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(order_id, "Payment event channel full, event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(order_id, "Payment event channel closed, event dropped");
            }
        }
    }
}

pub struct PaymentEventWorker {
    popularity: PopularityRanking,
    sink: Arc<dyn NotificationSink>,
}

impl PaymentEventWorker {
    pub fn new(popularity: PopularityRanking, sink: Arc<dyn NotificationSink>) -> Self {
        Self { popularity, sink }
    }

    /// Consume events until the channel closes or `shutdown` fires
    pub async fn run(self, mut rx: mpsc::Receiver<PaymentEvent>, shutdown: CancellationToken) {
        tracing::info!("Payment event worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Payment event worker received shutdown signal");
                    break;
                }
                event = rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Payment event channel closed, worker stopping");
                        break;
                    };
                    let order_id = event.order_id();
                    if AssertUnwindSafe(self.handle(event)).catch_unwind().await.is_err() {
                        tracing::error!(order_id, "Payment event handler panicked");
                    }
                }
            }
        }
    }

    /// Apply one event; failures are logged and swallowed
    pub async fn handle(&self, event: PaymentEvent) {
        match event {
            PaymentEvent::OrderConfirmed(view) => {
                if let Err(e) = self.popularity.record_order(&view.items).await {
                    tracing::warn!(order_id = view.order.id, error = %e, "Failed to update popularity");
                }
                if let Err(e) = self.sink.notify(&view).await {
                    tracing::warn!(order_id = view.order.id, error = %e, "Failed to send order notification");
                }
            }
        }
    }
}
