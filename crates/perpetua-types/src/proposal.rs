//! Action proposals pending arbitration.
//!
//! A proposal is ephemeral: it exists for the duration of one tick's
//! arbitration and is never persisted beyond the audit record of its
//! outcome. The arbitrator orders the batch by `(sequence, agent_id)` and
//! resolves exclusive-target conflicts deterministically.

use serde::{Deserialize, Serialize};

use crate::enums::ProposalSource;
use crate::ids::{AgentId, FeatureId};
use crate::structs::Position;

/// A typed action an agent wants to perform this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedAction {
    /// Do nothing observable. The safe default for every fallback path.
    Observe,
    /// Move to a new position.
    Move {
        /// Destination coordinate.
        to: Position,
    },
    /// Place a block into a voxel cell.
    PlaceBlock {
        /// Target coordinate.
        at: Position,
        /// Block kind to place.
        kind: String,
    },
    /// Remove the block at a voxel cell.
    RemoveBlock {
        /// Target coordinate.
        at: Position,
    },
    /// Gather from a resource feature, restoring energy.
    Gather {
        /// The feature to gather from.
        feature: FeatureId,
    },
    /// Claim exclusive ownership of a feature.
    ClaimFeature {
        /// The feature to claim.
        feature: FeatureId,
    },
}

impl ProposedAction {
    /// The exclusive resource this action contends for, if any.
    ///
    /// Two proposals conflict when they return the same key within the
    /// same tick. `Observe` and `Move` contend for nothing.
    pub const fn exclusive_target(&self) -> Option<TargetKey> {
        match self {
            Self::Observe | Self::Move { .. } => None,
            Self::PlaceBlock { at, .. } | Self::RemoveBlock { at } => Some(TargetKey::Voxel(*at)),
            Self::Gather { feature } | Self::ClaimFeature { feature } => {
                Some(TargetKey::Feature(*feature))
            }
        }
    }

    /// Short label for logging.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Observe => "observe",
            Self::Move { .. } => "move",
            Self::PlaceBlock { .. } => "place_block",
            Self::RemoveBlock { .. } => "remove_block",
            Self::Gather { .. } => "gather",
            Self::ClaimFeature { .. } => "claim_feature",
        }
    }
}

/// Identifies an exclusive resource contested within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetKey {
    /// A voxel coordinate (at most one occupant).
    Voxel(Position),
    /// A feature claimed or harvested exclusively this tick.
    Feature(FeatureId),
}

/// A concept the oracle proposed alongside an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptProposal {
    /// Unique concept name.
    pub name: String,
    /// Free-text definition.
    pub definition: String,
    /// Free-text effects description.
    pub effects: String,
}

/// One agent's requested action for the current tick, pending arbitration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProposal {
    /// The proposing agent.
    pub agent_id: AgentId,
    /// The tick this proposal belongs to.
    pub tick: u64,
    /// Submission sequence assigned by the pipeline in eligibility-scan
    /// order; the primary arbitration ordering key.
    pub sequence: u32,
    /// The proposed action.
    pub action: ProposedAction,
    /// A memory fragment the oracle wants appended to the agent.
    pub new_memory: Option<String>,
    /// A concept the oracle wants to coin, applied only on acceptance.
    pub concept: Option<ConceptProposal>,
    /// Where the decision came from (oracle or a fallback path).
    pub source: ProposalSource,
}

impl ActionProposal {
    /// Build the default `Observe` proposal used by every fallback path.
    pub const fn fallback(
        agent_id: AgentId,
        tick: u64,
        sequence: u32,
        source: ProposalSource,
    ) -> Self {
        Self {
            agent_id,
            tick,
            sequence,
            action: ProposedAction::Observe,
            new_memory: None,
            concept: None,
            source,
        }
    }

    /// Arbitration ordering key: `(sequence, agent_id)`.
    pub const fn ordering_key(&self) -> (u32, AgentId) {
        (self.sequence, self.agent_id)
    }
}
