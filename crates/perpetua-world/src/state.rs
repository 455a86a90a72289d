//! The complete in-memory world state.
//!
//! [`WorldState`] bundles the voxel grid, feature map, agent registry,
//! concept registry, and god rule registry. It is authoritative during a
//! run; persistence is write-behind and replayed on restart.

use perpetua_types::Position;

use crate::agents::AgentRegistry;
use crate::concepts::ConceptRegistry;
use crate::features::FeatureMap;
use crate::grid::VoxelGrid;
use crate::rules::GodRuleRegistry;

/// The full mutable world.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    /// The sparse voxel grid.
    pub grid: VoxelGrid,
    /// All world features.
    pub features: FeatureMap,
    /// All agents ever spawned.
    pub agents: AgentRegistry,
    /// All coined concepts.
    pub concepts: ConceptRegistry,
    /// God rule overrides.
    pub rules: GodRuleRegistry,
}

impl WorldState {
    /// Create an empty world with all rules at defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the world-wake phase: regenerate features under the current
    /// effective rules. Returns the total stock regained.
    pub fn wake(&mut self) -> f64 {
        let multiplier = self.rules.effective().resource_regen_multiplier();
        self.features.regenerate(multiplier)
    }

    /// Whether a position is inside the effective world radius.
    pub fn in_bounds(&self, position: Position) -> bool {
        position.radius() <= self.rules.effective().max_world_radius()
    }

    /// An opaque summary of the world, captured into each tick record.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "agents_alive": self.agents.living_count(),
            "agents_total": self.agents.total_count(),
            "voxels_occupied": self.grid.occupied_count(),
            "features": self.features.count(),
            "concepts": self.concepts.count(),
            "rules": self.rules.effective().values(),
        })
    }
}
