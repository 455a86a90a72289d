//! The append-only event log.
//!
//! Events are totally ordered by `(tick, sequence)`. The log splits
//! recording into two phases: [`EventLog::seal`] assigns ids, sequences,
//! and timestamps without touching the committed log, and
//! [`EventLog::commit`] appends the sealed batch and fans it out to
//! subscribers. The engine persists sealed events *between* the two
//! phases, so a failed persist never burns sequence numbers -- the retried
//! tick seals a fresh batch starting from the same sequence.

use std::collections::BTreeMap;

use chrono::Utc;
use perpetua_types::{AgentId, Event, EventDraft, EventId};

use crate::subscribe::EventSubscriber;

/// The in-memory committed event log plus subscriber registry.
#[derive(Default)]
pub struct EventLog {
    events: Vec<Event>,
    committed_per_tick: BTreeMap<u64, u32>,
    importance_threshold: u8,
    subscribers: Vec<Box<dyn EventSubscriber>>,
}

impl core::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventLog")
            .field("events", &self.events.len())
            .field("importance_threshold", &self.importance_threshold)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventLog {
    /// Create an empty log recording events at or above the threshold.
    pub fn new(importance_threshold: u8) -> Self {
        Self {
            importance_threshold,
            ..Self::default()
        }
    }

    /// Rebuild the log from persisted events, e.g. on restart.
    ///
    /// Events are re-sorted by `(tick, sequence)` so the replay order never
    /// depends on storage order.
    pub fn from_events(importance_threshold: u8, mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| (e.tick, e.sequence));
        let mut committed_per_tick = BTreeMap::new();
        for event in &events {
            committed_per_tick.insert(event.tick, event.sequence.saturating_add(1));
        }
        Self {
            events,
            committed_per_tick,
            importance_threshold,
            subscribers: Vec::new(),
        }
    }

    /// Register a subscriber for all future commits.
    pub fn subscribe(&mut self, subscriber: Box<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Number of committed events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Seal a batch of drafts for a tick: drop drafts below the importance
    /// threshold, then assign ids, contiguous sequences, and timestamps.
    ///
    /// Pure with respect to the committed log -- sealing the same drafts
    /// twice (after a failed persist) yields the same sequences.
    pub fn seal(&self, tick: u64, drafts: Vec<EventDraft>) -> Vec<Event> {
        let start = self.committed_per_tick.get(&tick).copied().unwrap_or(0);
        drafts
            .into_iter()
            .filter(|draft| draft.importance >= self.importance_threshold)
            .enumerate()
            .map(|(offset, draft)| {
                let offset = u32::try_from(offset).unwrap_or(u32::MAX);
                Event {
                    id: EventId::new(),
                    event_type: draft.event_type,
                    importance: draft.importance,
                    title: draft.title,
                    description: draft.description,
                    agent_ids: draft.agent_ids,
                    concept_ids: draft.concept_ids,
                    tick,
                    sequence: start.saturating_add(offset),
                    metadata: draft.metadata,
                    created_at: Utc::now(),
                }
            })
            .collect()
    }

    /// Commit a sealed batch: append to the log and notify subscribers.
    ///
    /// Subscriber failures are logged and isolated; they never affect the
    /// log or other subscribers.
    pub fn commit(&mut self, sealed: Vec<Event>) {
        for event in sealed {
            self.committed_per_tick
                .insert(event.tick, event.sequence.saturating_add(1));
            for subscriber in &self.subscribers {
                if let Err(error) = subscriber.notify(&event) {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        event_id = %event.id,
                        %error,
                        "event delivery failed"
                    );
                }
            }
            self.events.push(event);
        }
    }

    /// Events within an inclusive tick range, in `(tick, sequence)` order.
    pub fn range(&self, from_tick: u64, to_tick: u64) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.tick >= from_tick && e.tick <= to_tick)
            .collect()
    }

    /// One page of the full log, newest first.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<&Event> {
        self.events.iter().rev().skip(offset).take(limit).collect()
    }

    /// Events involving an agent, in `(tick, sequence)` order.
    pub fn involving(&self, agent_id: AgentId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.agent_ids.contains(&agent_id))
            .collect()
    }

    /// Events at or above an importance floor, in `(tick, sequence)` order.
    pub fn significant(&self, min_importance: u8) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.importance >= min_importance)
            .collect()
    }

    /// Iterate all committed events in `(tick, sequence)` order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
