//! Perception assembly: everything one agent is allowed to see this tick.
//!
//! Nearby agents and features are sorted nearest first (ties broken by the
//! source's id order), the memory excerpt is the newest fragments, and the
//! voxel neighborhood comes straight from the grid's deterministic
//! iteration order.

use perpetua_types::{
    Agent, BlockGlimpse, FeatureGlimpse, NearbyAgent, Perception, SelfView,
};
use perpetua_world::WorldState;

/// Assemble the perception payload for one agent.
pub fn build_perception(
    world: &WorldState,
    agent: &Agent,
    tick: u64,
    radius: f64,
    memory_excerpt_len: usize,
) -> Perception {
    let memory_excerpt: Vec<String> = agent
        .memory
        .iter()
        .rev()
        .take(memory_excerpt_len)
        .rev()
        .cloned()
        .collect();

    let mut nearby_agents: Vec<NearbyAgent> = world
        .agents
        .living_within(agent.position, radius, agent.id)
        .into_iter()
        .map(|other| NearbyAgent {
            id: other.id,
            name: other.name.clone(),
            position: other.position,
            distance: agent.position.distance(other.position),
        })
        .collect();
    nearby_agents.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let mut nearby_features: Vec<FeatureGlimpse> = world
        .features
        .active_within(agent.position, radius)
        .into_iter()
        .map(|feature| FeatureGlimpse {
            id: feature.id,
            kind: feature.kind,
            position: feature.position,
            distance: agent.position.distance(feature.position),
            properties: feature.properties.clone(),
        })
        .collect();
    nearby_features.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let nearby_blocks: Vec<BlockGlimpse> = world
        .grid
        .cells_within(agent.position, radius)
        .into_iter()
        .map(|(position, block)| BlockGlimpse {
            position,
            kind: block.kind.clone(),
        })
        .collect();

    Perception {
        tick,
        self_view: SelfView {
            id: agent.id,
            name: agent.name.clone(),
            position: agent.position,
            energy: agent.energy,
            memory_excerpt,
            state_ext: agent.state_ext.clone(),
        },
        nearby_agents,
        nearby_features,
        nearby_blocks,
        known_concepts: agent.known_concepts.iter().cloned().collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use perpetua_types::{Block, Position};

    use super::*;

    #[test]
    fn perception_is_radius_limited_and_sorted() {
        let mut world = WorldState::new();
        let me = Agent::spawn("me", Position::new(0, 0), 1);
        let my_id = me.id;
        let mut far = Agent::spawn("far", Position::new(8, 0), 1);
        far.position = Position::new(8, 0);
        let near = Agent::spawn("near", Position::new(1, 0), 1);
        let beyond = Agent::spawn("beyond", Position::new(30, 0), 1);
        world.agents.insert(me).unwrap();
        world.agents.insert(far).unwrap();
        world.agents.insert(near).unwrap();
        world.agents.insert(beyond).unwrap();
        world
            .grid
            .place(
                Position::new(2, 2),
                Block {
                    kind: String::from("stone"),
                    placed_by: None,
                    placed_at_tick: 1,
                },
            )
            .unwrap();

        let agent = world.agents.get(my_id).unwrap().clone();
        let perception = build_perception(&world, &agent, 5, 10.0, 8);

        assert_eq!(perception.tick, 5);
        assert_eq!(perception.nearby_agents.len(), 2);
        assert_eq!(perception.nearby_agents[0].name, "near");
        assert_eq!(perception.nearby_agents[1].name, "far");
        assert_eq!(perception.nearby_blocks.len(), 1);
    }

    #[test]
    fn memory_excerpt_keeps_newest_in_order() {
        let world = WorldState::new();
        let mut agent = Agent::spawn("m", Position::new(0, 0), 1);
        for i in 0..5 {
            agent.memory.push(format!("m{i}"));
        }
        let perception = build_perception(&world, &agent, 1, 10.0, 3);
        assert_eq!(
            perception.self_view.memory_excerpt,
            vec!["m2", "m3", "m4"]
        );
    }
}
