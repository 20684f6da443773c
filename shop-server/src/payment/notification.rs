//! Outbound order notifications

use super::events::ConfirmedOrderView;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint answered {0}")]
    Rejected(u16),
}

/// Receives confirmed orders, fire-and-forget
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, order: &ConfirmedOrderView) -> Result<(), NotificationError>;
}

/// Writes the notification to the log (default when no webhook is configured)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, order: &ConfirmedOrderView) -> Result<(), NotificationError> {
        tracing::info!(
            target: "notification",
            order_id = order.order.id,
            user_id = order.order.user_id,
            final_amount = order.final_amount,
            items = order.items.len(),
            "Order confirmed"
        );
        Ok(())
    }
}

/// POSTs the confirmed order as JSON to a webhook
#[derive(Clone)]
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(&self, order: &ConfirmedOrderView) -> Result<(), NotificationError> {
        let response = self.client.post(&self.url).json(order).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }
        tracing::debug!(order_id = order.order.id, url = %self.url, "Order notification delivered");
        Ok(())
    }
}

/// Remembers every notified order id
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    seen: parking_lot::Mutex<Vec<i64>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn order_ids(&self) -> Vec<i64> {
        self.seen.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, order: &ConfirmedOrderView) -> Result<(), NotificationError> {
        self.seen.lock().push(order.order.id);
        Ok(())
    }
}
