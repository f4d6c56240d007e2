//! HTTP webhook delivery for escalation events.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{Notifier, NotifyError};

#[derive(Serialize)]
struct EscalationEvent {
    report_id: Uuid,
    new_level: u8,
}

/// POSTs escalation events to `{base}/api/hooks/escalation`.
pub struct WebhookNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl WebhookNotifier {
    /// `base_url` should be like `http://localhost:4000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, report_id: Uuid, new_level: u8) -> Result<(), NotifyError> {
        let url = format!("{}/api/hooks/escalation", self.base_url);
        let event = EscalationEvent {
            report_id,
            new_level,
        };

        info!(url = %url, report_id = %report_id, new_level, "posting escalation event");
        let resp = self.client.post(&url).json(&event).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_trims_trailing_slash() {
        let notifier = WebhookNotifier::new("http://localhost:4000/".into());
        assert_eq!(notifier.base_url, "http://localhost:4000");
    }

    #[test]
    fn event_serializes_expected_shape() {
        let event = EscalationEvent {
            report_id: Uuid::nil(),
            new_level: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["new_level"], 2);
        assert_eq!(
            json["report_id"],
            "00000000-0000-0000-0000-000000000000"
        );
    }
}
