//! Best-effort completion notifications.
//!
//! When a record reaches `completed`, someone may want to hear about it —
//! an email relay, a webhook, a desktop toast. Whatever the sink is, it is
//! strictly advisory: a notification failure is logged and swallowed,
//! never allowed to disturb the record's state or the caller's control
//! flow. The protocol's correctness does not depend on anyone being told.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::TransferRecord;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// A place completed records get announced to.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_completed(&self, record: &TransferRecord) -> Result<(), NotifyError>;
}

/// A sink that only logs. The default when the embedder wires up nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify_completed(&self, record: &TransferRecord) -> Result<(), NotifyError> {
        tracing::info!(
            id = %record.id,
            amount = %record.amount,
            sender = %record.sender,
            recipient = %record.recipient,
            "transfer completed"
        );
        Ok(())
    }
}

/// Fire a completion notification without letting its outcome matter.
pub async fn notify_best_effort(sink: &dyn NotificationSink, record: &TransferRecord) {
    if let Err(e) = sink.notify_completed(record).await {
        tracing::warn!(id = %record.id, error = %e, "completion notification failed");
    }
}
