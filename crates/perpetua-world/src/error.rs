//! Error types for the `perpetua-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

use perpetua_types::{AgentId, FeatureId, Position};

/// Errors that can occur during world-state operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A voxel cell is occupied by a block of a different kind.
    #[error("cell {position} is occupied by a {existing_kind} block")]
    CellOccupied {
        /// The contested coordinate.
        position: Position,
        /// Kind of the block already in the cell.
        existing_kind: String,
    },

    /// A voxel cell was expected to hold a block but is empty.
    #[error("cell {0} is vacant")]
    CellVacant(Position),

    /// A position falls outside the effective world radius.
    #[error("position {position} is outside the world radius {radius}")]
    OutOfWorld {
        /// The offending coordinate.
        position: Position,
        /// The effective world radius at the time of the check.
        radius: f64,
    },

    /// An agent was not found in the registry.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// A feature was not found in the registry.
    #[error("feature not found: {0}")]
    FeatureNotFound(FeatureId),

    /// A feature is already claimed by another agent.
    #[error("feature {feature} is already claimed by agent {owner}")]
    FeatureClaimed {
        /// The contested feature.
        feature: FeatureId,
        /// The agent holding the claim.
        owner: AgentId,
    },

    /// A duplicate agent was inserted where uniqueness is required.
    #[error("duplicate agent id: {0}")]
    DuplicateAgent(AgentId),

    /// A duplicate feature was inserted where uniqueness is required.
    #[error("duplicate feature id: {0}")]
    DuplicateFeature(FeatureId),
}
