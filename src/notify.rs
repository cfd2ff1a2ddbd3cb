//! Notification bridge: best-effort handoff to the club application's
//! notification-creation service.
//!
//! Events are queued onto a bounded channel and delivered by a worker task,
//! so the realtime event path never blocks on the external service. A full
//! queue drops the notification; delivery failures are logged and dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    IncomingCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// External notification-creation service boundary.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Sink for deployments without a wired notification service: logs and
/// discards.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::debug!(
            recipient_id = %notification.recipient_id,
            kind = ?notification.kind,
            "Notification dispatched"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationBridge {
    tx: mpsc::Sender<Notification>,
}

impl NotificationBridge {
    /// Spawn the delivery worker and return the enqueue handle.
    pub fn spawn(sink: Arc<dyn NotificationSink>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(queue_depth);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.deliver(notification.clone()).await {
                    tracing::warn!(
                        recipient_id = %notification.recipient_id,
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        });
        Self { tx }
    }

    /// Fire-and-forget enqueue. Never blocks the caller.
    pub fn enqueue(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!(error = %e, "Notification queue full, dropping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    pub struct RecordingSink {
        pub delivered: Mutex<Vec<Notification>>,
        pub fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, notification: Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError("sink down".to_string()));
            }
            self.delivered.lock().unwrap().push(notification);
            Ok(())
        }
    }

    fn note(recipient: &str) -> Notification {
        Notification {
            recipient_id: recipient.to_string(),
            kind: NotificationKind::NewMessage,
            body: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn worker_delivers_enqueued_notifications() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(vec![]),
            fail: false,
        });
        let bridge = NotificationBridge::spawn(sink.clone(), 8);

        bridge.enqueue(note("alice"));
        bridge.enqueue(note("bob"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].recipient_id, "alice");
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = Arc::new(RecordingSink {
            delivered: Mutex::new(vec![]),
            fail: true,
        });
        let bridge = NotificationBridge::spawn(sink, 8);

        // Must not panic or surface anywhere
        bridge.enqueue(note("alice"));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
