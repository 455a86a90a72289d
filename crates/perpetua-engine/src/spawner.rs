//! Genesis spawner: the first agents and features of a fresh world.
//!
//! Agents get unique names from a built-in pool and random positions near
//! the origin; a handful of resource features is scattered around them so
//! the first eras have something to gather from.

use std::collections::BTreeMap;

use rand::Rng;

use perpetua_types::{Agent, FeatureId, FeatureKind, Position, WorldFeature};
use perpetua_world::{PROP_CAPACITY, PROP_REGEN, PROP_STOCK, TemplatePlacement, WorldTemplate};

/// Built-in pool of agent names. Picked without replacement; overflow
/// gets a numeric suffix.
const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze", "Iris", "Juniper",
    "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine", "Quill", "Reed", "Sage", "Thorn", "Umber",
    "Vale", "Wren", "Yarrow", "Zephyr", "Ash", "Brook", "Clay", "Dawn", "Elm", "Flint", "Gale",
];

/// How far from the origin agents and features may spawn.
const SPAWN_RADIUS: i32 = 12;

/// Resource features seeded per world.
const GENESIS_RESOURCES: usize = 3;

/// Everything the genesis run seeds the world with.
#[derive(Debug)]
pub struct GenesisSeed {
    /// The first agents.
    pub agents: Vec<Agent>,
    /// The first features.
    pub features: Vec<WorldFeature>,
    /// A small landmark template marking the origin.
    pub template: WorldTemplate,
}

/// Build the genesis seed for a fresh world.
pub fn genesis_seed(agent_count: u32) -> GenesisSeed {
    let mut rng = rand::rng();

    let agents = (0..agent_count)
        .map(|i| {
            let index = usize::try_from(i).unwrap_or(usize::MAX);
            let name = NAME_POOL.get(index).map_or_else(
                || {
                    let wrapped = index.checked_rem(NAME_POOL.len()).unwrap_or(0);
                    let base = NAME_POOL.get(wrapped).copied().unwrap_or("Wanderer");
                    format!("{base}-{i}")
                },
                |&base| base.to_owned(),
            );
            Agent::spawn(name, random_position(&mut rng), 0)
        })
        .collect();

    let features = (0..GENESIS_RESOURCES)
        .map(|_| WorldFeature {
            id: FeatureId::new(),
            kind: FeatureKind::Resource,
            position: random_position(&mut rng),
            radius: 3.0,
            properties: BTreeMap::from([
                (String::from(PROP_STOCK), 40.0),
                (String::from(PROP_REGEN), 2.0),
                (String::from(PROP_CAPACITY), 60.0),
            ]),
            claimed_by: None,
            is_active: true,
        })
        .collect();

    GenesisSeed {
        agents,
        features,
        template: origin_template(),
    }
}

fn random_position(rng: &mut impl Rng) -> Position {
    Position::new(
        rng.random_range(-SPAWN_RADIUS..=SPAWN_RADIUS),
        rng.random_range(-SPAWN_RADIUS..=SPAWN_RADIUS),
    )
}

/// A small stone marker at the world origin.
fn origin_template() -> WorldTemplate {
    WorldTemplate {
        name: String::from("origin-marker"),
        placements: vec![
            TemplatePlacement {
                at: Position::new(0, 0),
                kind: String::from("stone"),
            },
            TemplatePlacement {
                at: Position::new(1, 0),
                kind: String::from("stone"),
            },
            TemplatePlacement {
                at: Position::new(0, 1),
                kind: String::from("stone"),
            },
        ],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn seed_respects_the_requested_count() {
        let seed = genesis_seed(5);
        assert_eq!(seed.agents.len(), 5);
        assert_eq!(seed.features.len(), GENESIS_RESOURCES);
        assert!(seed.agents.iter().all(|a| a.alive && a.energy == 100));
    }

    #[test]
    fn seed_names_are_unique() {
        let seed = genesis_seed(20);
        let names: std::collections::BTreeSet<&str> =
            seed.agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn spawn_positions_stay_near_the_origin() {
        let seed = genesis_seed(10);
        for agent in &seed.agents {
            assert!(agent.position.x.abs() <= SPAWN_RADIUS);
            assert!(agent.position.y.abs() <= SPAWN_RADIUS);
        }
    }
}
