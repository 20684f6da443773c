//! Payment orchestration
//!
//! [`PaymentOrchestrator`] drives the stock, coupon and point mutators as a
//! saga. Confirmed payments fan out to [`PaymentEventWorker`] over a bounded
//! channel, which keeps the popularity ranking and notifications off the
//! payment path.

mod compensation;
mod events;
pub(crate) mod notification;
mod orchestrator;
mod popularity;

pub use compensation::{CompensationLog, CompensationOutcome, CompletedStep};
pub use events::{ConfirmedOrderView, PaymentEvent, PaymentEventPublisher, PaymentEventWorker};
pub use notification::{LogNotificationSink, NotificationError, NotificationSink, WebhookNotificationSink};
pub use orchestrator::{PaymentOrchestrator, SagaMutators};
pub use popularity::{POPULARITY_KEY, PopularityRanking};
