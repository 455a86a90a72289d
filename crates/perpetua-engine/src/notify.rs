//! Event subscribers wired into the engine's event log.

use std::time::Duration;

use perpetua_events::{EventSubscriber, NotifyError};
use perpetua_types::Event;

/// Subscriber that mirrors every committed event into the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl EventSubscriber for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        tracing::info!(
            tick = event.tick,
            sequence = event.sequence,
            event_type = event.event_type.as_str(),
            importance = event.importance,
            title = %event.title,
            "world event"
        );
        Ok(())
    }
}

/// Subscriber that POSTs each committed event to an external collaborator,
/// e.g. a discussion-board service that opens a thread per significant
/// event.
///
/// Delivery is fire-and-forget on a spawned task so a slow or unreachable
/// endpoint never stalls the tick; transport failures are logged by the
/// task itself.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Delivery timeout for one webhook POST.
    const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a notifier targeting the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl EventSubscriber for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        let payload =
            serde_json::to_value(event).map_err(|error| NotifyError(error.to_string()))?;
        let client = self.client.clone();
        let url = self.url.clone();
        let event_id = event.id;
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(Self::DELIVERY_TIMEOUT)
                .json(&payload)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            if let Err(error) = result {
                tracing::warn!(%event_id, %error, "webhook delivery failed");
            }
        });
        Ok(())
    }
}
