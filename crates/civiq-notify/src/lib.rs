//! Notification sink invoked when the escalation sweep raises a report's
//! level. Delivery itself is an external concern; this crate defines the
//! interface, a tracing-only default, and an HTTP webhook behind the
//! `http` feature.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[cfg(feature = "http")]
mod webhook;
#[cfg(feature = "http")]
pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned {status}: {body}")]
    Server { status: u16, body: String },
}

/// Receives one call per escalation level change.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report_id: Uuid, new_level: u8) -> Result<(), NotifyError>;
}

#[async_trait]
impl Notifier for Box<dyn Notifier> {
    async fn notify(&self, report_id: Uuid, new_level: u8) -> Result<(), NotifyError> {
        (**self).notify(report_id, new_level).await
    }
}

/// Default sink: records the event in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report_id: Uuid, new_level: u8) -> Result<(), NotifyError> {
        info!(report_id = %report_id, new_level, "escalation notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier;
        notifier.notify(Uuid::new_v4(), 2).await.unwrap();
    }
}
