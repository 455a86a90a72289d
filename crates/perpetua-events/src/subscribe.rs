//! Best-effort event subscribers.
//!
//! Subscribers are notified after each commit, strictly outside the tick's
//! critical path: a failing subscriber is logged and skipped, and can never
//! fail a tick or reorder the log.

use perpetua_types::Event;

/// Error raised by a subscriber while handling an event.
#[derive(Debug, thiserror::Error)]
#[error("subscriber delivery failed: {0}")]
pub struct NotifyError(pub String);

/// A best-effort consumer of committed events.
pub trait EventSubscriber: Send + Sync {
    /// Name used in delivery-failure logs.
    fn name(&self) -> &str;

    /// Handle one committed event.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails; the log records the
    /// failure and moves on.
    fn notify(&self, event: &Event) -> Result<(), NotifyError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use perpetua_types::EventId;

    use super::*;

    /// Records delivered event ids; optionally fails every delivery.
    /// Shareable so tests keep a handle after handing the log a clone.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSubscriber {
        /// Ids of events delivered so far.
        pub seen: Arc<Mutex<Vec<EventId>>>,
        /// When set, every delivery fails.
        pub failing: bool,
    }

    impl RecordingSubscriber {
        /// Snapshot of the delivered ids.
        pub fn delivered(&self) -> Vec<EventId> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    impl EventSubscriber for RecordingSubscriber {
        fn name(&self) -> &str {
            "recording"
        }

        fn notify(&self, event: &Event) -> Result<(), NotifyError> {
            if self.failing {
                return Err(NotifyError(String::from("wired to fail")));
            }
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(event.id);
            }
            Ok(())
        }
    }
}
