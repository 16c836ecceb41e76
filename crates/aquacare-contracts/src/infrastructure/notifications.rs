//! Notification sinks

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ports::outbound::{Notification, NotificationKind, NotificationSink, RepositoryError};

/// Writes admin notifications to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), RepositoryError> {
        tracing::info!(
            kind = ?notification.kind,
            customer_id = notification.customer_id.as_ref().map(|c| c.as_str()),
            contract_id = notification.contract_id.as_ref().map(|c| c.as_str()),
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().iter().filter(|n| n.kind == kind).count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), RepositoryError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}
