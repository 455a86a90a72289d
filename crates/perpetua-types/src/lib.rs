//! Shared type definitions for the Perpetua world simulation.
//!
//! This crate is the single source of truth for the types that flow between
//! the tick engine, the world state store, the event log, the decision
//! oracle boundary, and the persistence layer.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (events, rejections, feature kinds)
//! - [`structs`] -- Core entity structs (agents, blocks, features, ticks,
//!   events, saga chapters)
//! - [`proposal`] -- Action proposals pending arbitration
//! - [`perception`] -- Perception payload delivered to the decision oracle

pub mod enums;
pub mod ids;
pub mod perception;
pub mod proposal;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{EventType, FeatureKind, ProposalSource, RejectionReason};
pub use ids::{AgentId, ChapterId, EventId, FeatureId};
pub use perception::{BlockGlimpse, FeatureGlimpse, NearbyAgent, Perception, SelfView};
pub use proposal::{ActionProposal, ConceptProposal, ProposedAction, TargetKey};
pub use structs::{
    Agent, Block, Concept, EraStatistics, Event, EventDraft, Position, SagaChapter, TickRecord,
    WorldFeature,
};
