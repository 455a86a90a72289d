//! Perception payload assembled per agent each decision round.
//!
//! The perception is everything the decision oracle is allowed to see:
//! the agent's own state, nearby agents and features within the
//! configured radius, and the concepts the agent knows. It is serialized
//! to JSON and shipped to the oracle verbatim.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::FeatureKind;
use crate::ids::{AgentId, FeatureId};
use crate::structs::Position;

/// The agent's view of itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfView {
    /// The agent's identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Current position.
    pub position: Position,
    /// Current energy (0-100).
    pub energy: u32,
    /// Most recent memory fragments (bounded excerpt, newest last).
    pub memory_excerpt: Vec<String>,
    /// Open-ended extension state echoed back to the oracle.
    pub state_ext: BTreeMap<String, serde_json::Value>,
}

/// A nearby agent as seen from the perceiving agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyAgent {
    /// The observed agent's identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Position of the observed agent.
    pub position: Position,
    /// Distance from the perceiver.
    pub distance: f64,
}

/// A nearby feature as seen from the perceiving agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGlimpse {
    /// The feature's identifier (used to target `gather`/`claim`).
    pub id: FeatureId,
    /// What kind of zone it is.
    pub kind: FeatureKind,
    /// Center of the zone.
    pub position: Position,
    /// Distance from the perceiver to the zone center.
    pub distance: f64,
    /// Visible numeric properties (stock levels, yields).
    pub properties: BTreeMap<String, f64>,
}

/// An occupied voxel cell as seen from the perceiving agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGlimpse {
    /// The cell coordinate.
    pub position: Position,
    /// Kind of the occupying block.
    pub kind: String,
}

/// The full perception payload for one agent, one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    /// The tick being decided.
    pub tick: u64,
    /// The perceiving agent's self view.
    pub self_view: SelfView,
    /// Living agents within the perception radius, nearest first.
    pub nearby_agents: Vec<NearbyAgent>,
    /// Active features within the perception radius, nearest first.
    pub nearby_features: Vec<FeatureGlimpse>,
    /// Occupied voxel cells within the perception radius.
    pub nearby_blocks: Vec<BlockGlimpse>,
    /// Names of concepts the agent knows.
    pub known_concepts: Vec<String>,
}
