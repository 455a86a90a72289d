//! Core entity structs for the Perpetua simulation.
//!
//! Everything structurally known carries a concrete typed field; genuinely
//! open-ended data (agent extension state, feature properties, event
//! metadata) lives in explicit narrow extension maps. Collections are
//! `BTreeMap`/`BTreeSet` so iteration order is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{EventType, FeatureKind};
use crate::ids::{AgentId, EventId, FeatureId};

/// A 2D integer coordinate in the voxel grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Position {
    /// East-west coordinate.
    pub x: i32,
    /// North-south coordinate.
    pub y: i32,
}

impl Position {
    /// Construct a position from raw coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }

    /// Euclidean distance from the world origin.
    pub fn radius(self) -> f64 {
        self.distance(Self::default())
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An autonomous agent inhabiting the world.
///
/// Mutated only by the arbitrator while applying an accepted proposal, and
/// by the world-wake regeneration phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Display name, immutable after spawn.
    pub name: String,
    /// Current grid position.
    pub position: Position,
    /// Whether the agent is alive. Transitions to `false` exactly once.
    pub alive: bool,
    /// Current energy (0-100). Gathering restores it; actions drain it.
    pub energy: u32,
    /// Chronological memory fragments written back by the oracle.
    pub memory: Vec<String>,
    /// Names of concepts this agent knows.
    pub known_concepts: BTreeSet<String>,
    /// Open-ended extension state (oracle-defined keys).
    pub state_ext: BTreeMap<String, serde_json::Value>,
    /// The last tick this agent received a decision round, if any.
    pub last_decision_tick: Option<u64>,
    /// Tick the agent entered the world.
    pub born_at_tick: u64,
    /// Tick the agent died, if it has.
    pub died_at_tick: Option<u64>,
}

impl Agent {
    /// Create a living agent at a position with full energy.
    pub fn spawn(name: impl Into<String>, position: Position, born_at_tick: u64) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            position,
            alive: true,
            energy: 100,
            memory: Vec::new(),
            known_concepts: BTreeSet::new(),
            state_ext: BTreeMap::new(),
            last_decision_tick: None,
            born_at_tick,
            died_at_tick: None,
        }
    }
}

/// A block occupying a voxel cell.
///
/// Two blocks are "identical" for idempotent placement when their `kind`
/// matches; provenance fields do not participate in that comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Material or marker kind (open-ended vocabulary).
    pub kind: String,
    /// The agent that placed this block, if any (templates place none).
    pub placed_by: Option<AgentId>,
    /// Tick at which the block was placed.
    pub placed_at_tick: u64,
}

impl Block {
    /// Whether another block counts as identical for idempotent placement.
    pub fn same_kind(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// A named zone influencing nearby agent outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldFeature {
    /// Unique identifier.
    pub id: FeatureId,
    /// What kind of zone this is.
    pub kind: FeatureKind,
    /// Center of the zone.
    pub position: Position,
    /// Radius of influence.
    pub radius: f64,
    /// Open-ended numeric properties (`stock`, `regen`, `capacity`,
    /// `yield`).
    pub properties: BTreeMap<String, f64>,
    /// The agent holding an exclusive claim on this feature, if any.
    pub claimed_by: Option<AgentId>,
    /// Inactive features are invisible to perception and arbitration.
    pub is_active: bool,
}

impl WorldFeature {
    /// Read a numeric property, defaulting when absent.
    pub fn property(&self, key: &str, default: f64) -> f64 {
        self.properties.get(key).copied().unwrap_or(default)
    }
}

/// A concept coined by an agent through the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Unique concept name.
    pub name: String,
    /// Free-text definition from the oracle.
    pub definition: String,
    /// Free-text description of the concept's effects.
    pub effects: String,
    /// The agent that coined the concept.
    pub coined_by: AgentId,
    /// Tick of creation.
    pub coined_at_tick: u64,
}

/// The immutable record of one completed tick cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Monotonically increasing tick number, unique and gap-free.
    pub number: u64,
    /// Opaque world summary captured at cycle end.
    pub snapshot: serde_json::Value,
    /// Living agents at cycle end.
    pub agent_count: u32,
    /// Registered concepts at cycle end.
    pub concept_count: u32,
    /// Wall-clock duration of the cycle in milliseconds.
    pub processing_time_ms: u64,
    /// Real-world completion timestamp.
    pub completed_at: DateTime<Utc>,
}

/// A world-significant occurrence, append-only and immutable.
///
/// The ordering key is `(tick, sequence)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Category of the event.
    pub event_type: EventType,
    /// Significance on a 0-10 scale; the engine only records events at or
    /// above its configured threshold.
    pub importance: u8,
    /// Short human-readable title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Agents involved in the event.
    pub agent_ids: Vec<AgentId>,
    /// Concepts involved in the event, by name.
    pub concept_ids: Vec<String>,
    /// The tick this event belongs to.
    pub tick: u64,
    /// Insertion sequence within the tick.
    pub sequence: u32,
    /// Open-ended metadata payload.
    pub metadata: serde_json::Value,
    /// Real-world creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An event awaiting `(tick, sequence)` assignment by the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Category of the event.
    pub event_type: EventType,
    /// Significance on a 0-10 scale.
    pub importance: u8,
    /// Short human-readable title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Agents involved in the event.
    pub agent_ids: Vec<AgentId>,
    /// Concepts involved in the event, by name.
    pub concept_ids: Vec<String>,
    /// Open-ended metadata payload.
    pub metadata: serde_json::Value,
}

impl EventDraft {
    /// Start a draft with empty participants and metadata.
    pub fn new(
        event_type: EventType,
        importance: u8,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            importance,
            title: title.into(),
            description: description.into(),
            agent_ids: Vec::new(),
            concept_ids: Vec::new(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach an involved agent.
    #[must_use]
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_ids.push(agent_id);
        self
    }

    /// Attach an involved concept by name.
    #[must_use]
    pub fn with_concept(mut self, name: impl Into<String>) -> Self {
        self.concept_ids.push(name.into());
        self
    }

    /// Attach a metadata payload.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Aggregated statistics for one era, embedded in its saga chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EraStatistics {
    /// Agents born during the era.
    pub births: u32,
    /// Agents that died during the era.
    pub deaths: u32,
    /// Concepts coined during the era.
    pub concepts_created: u32,
    /// Events involving two or more agents.
    pub interactions: u32,
    /// Living agents when the era opened.
    pub start_agent_count: u32,
    /// Living agents when the era closed.
    pub end_agent_count: u32,
}

/// A generated narrative summary of one closed era.
///
/// Write-once per `era_number`; regeneration is an explicit administrative
/// override, never part of normal flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaChapter {
    /// Unique, contiguous era number (starting at 1).
    pub era_number: u64,
    /// First tick of the era.
    pub start_tick: u64,
    /// Last tick of the era; the next era starts at `end_tick + 1`.
    pub end_tick: u64,
    /// The oracle-generated narrative.
    pub narrative: String,
    /// A short summary line.
    pub summary: String,
    /// Aggregated era statistics.
    pub statistics: EraStatistics,
    /// Titles of the era's most significant events.
    pub key_events: Vec<String>,
    /// Names of the era's most involved agents.
    pub key_characters: Vec<String>,
    /// Wall-clock oracle generation latency in milliseconds.
    pub generation_time_ms: u64,
    /// Real-world creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_distance_is_euclidean() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((b.radius() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn spawned_agents_are_alive_with_full_energy() {
        let agent = Agent::spawn("Ash", Position::new(1, -2), 7);
        assert!(agent.alive);
        assert_eq!(agent.energy, 100);
        assert_eq!(agent.born_at_tick, 7);
        assert!(agent.died_at_tick.is_none());
        assert!(agent.last_decision_tick.is_none());
    }

    #[test]
    fn block_identity_ignores_provenance() {
        let a = Block {
            kind: String::from("stone"),
            placed_by: Some(AgentId::new()),
            placed_at_tick: 3,
        };
        let b = Block {
            kind: String::from("stone"),
            placed_by: None,
            placed_at_tick: 9,
        };
        assert!(a.same_kind(&b));
    }

    #[test]
    fn feature_property_defaults() {
        let feature = WorldFeature {
            id: FeatureId::new(),
            kind: FeatureKind::Resource,
            position: Position::new(2, 2),
            radius: 3.0,
            properties: BTreeMap::from([(String::from("stock"), 40.0)]),
            claimed_by: None,
            is_active: true,
        };
        assert!((feature.property("stock", 0.0) - 40.0).abs() < f64::EPSILON);
        assert!((feature.property("regen", 2.0) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn event_draft_builder_accumulates() {
        let agent = AgentId::new();
        let draft = EventDraft::new(EventType::ConceptCreated, 6, "Fire", "Fire was coined")
            .with_agent(agent)
            .with_concept("fire")
            .with_metadata(serde_json::json!({"definition": "hot"}));
        assert_eq!(draft.agent_ids, vec![agent]);
        assert_eq!(draft.concept_ids, vec![String::from("fire")]);
        assert_eq!(draft.importance, 6);
    }
}
