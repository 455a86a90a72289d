//! The agent registry.
//!
//! Death is one-way: [`AgentRegistry::kill`] flips `alive` to `false` and
//! records the tick, and no operation resurrects an agent. Dead agents stay
//! in the registry for history queries but are excluded from eligibility
//! scans and perception.

use std::collections::BTreeMap;

use perpetua_types::{Agent, AgentId, Position};

use crate::error::WorldError;

/// Registry of all agents ever spawned, keyed by [`AgentId`].
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentId, Agent>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The agent with the given id, if any.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Mutable access to an agent.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for unknown ids.
    pub fn get_mut(&mut self, id: AgentId) -> Result<&mut Agent, WorldError> {
        self.agents.get_mut(&id).ok_or(WorldError::AgentNotFound(id))
    }

    /// Insert a newly spawned agent.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateAgent`] if the id already exists.
    pub fn insert(&mut self, agent: Agent) -> Result<(), WorldError> {
        if self.agents.contains_key(&agent.id) {
            return Err(WorldError::DuplicateAgent(agent.id));
        }
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    /// Ids of living agents, ascending. This is the eligibility-scan order
    /// the decision pipeline assigns submission sequences in.
    pub fn living_ids(&self) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|a| a.alive)
            .map(|a| a.id)
            .collect()
    }

    /// Number of living agents.
    pub fn living_count(&self) -> usize {
        self.agents.values().filter(|a| a.alive).count()
    }

    /// Number of agents ever spawned.
    pub fn total_count(&self) -> usize {
        self.agents.len()
    }

    /// Kill an agent at a tick. Returns `false` if the agent was already
    /// dead (the original death tick is preserved).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] for unknown ids.
    pub fn kill(&mut self, id: AgentId, tick: u64) -> Result<bool, WorldError> {
        let agent = self.get_mut(id)?;
        if !agent.alive {
            return Ok(false);
        }
        agent.alive = false;
        agent.died_at_tick = Some(tick);
        tracing::info!(agent_id = %id, tick, "agent died");
        Ok(true)
    }

    /// Living agents within a radius of a point, excluding one agent
    /// (normally the perceiver), in id order.
    pub fn living_within(
        &self,
        center: Position,
        radius: f64,
        exclude: AgentId,
    ) -> Vec<&Agent> {
        self.agents
            .values()
            .filter(|a| a.alive && a.id != exclude && center.distance(a.position) <= radius)
            .collect()
    }

    /// Iterate all agents in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut registry = AgentRegistry::new();
        let agent = Agent::spawn("Ash", Position::new(0, 0), 1);
        registry.insert(agent.clone()).unwrap();
        let err = registry.insert(agent).unwrap_err();
        assert!(matches!(err, WorldError::DuplicateAgent(_)));
    }

    #[test]
    fn death_is_one_way() {
        let mut registry = AgentRegistry::new();
        let agent = Agent::spawn("Ash", Position::new(0, 0), 1);
        let id = agent.id;
        registry.insert(agent).unwrap();

        assert!(registry.kill(id, 5).unwrap());
        assert!(!registry.kill(id, 9).unwrap());
        // First death tick is preserved.
        assert_eq!(registry.get(id).unwrap().died_at_tick, Some(5));
        assert_eq!(registry.living_count(), 0);
        assert_eq!(registry.total_count(), 1);
    }

    #[test]
    fn living_ids_ascend() {
        let mut registry = AgentRegistry::new();
        for name in ["a", "b", "c"] {
            registry
                .insert(Agent::spawn(name, Position::new(0, 0), 1))
                .unwrap();
        }
        let ids = registry.living_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn living_within_excludes_perceiver_and_dead() {
        let mut registry = AgentRegistry::new();
        let me = Agent::spawn("me", Position::new(0, 0), 1);
        let my_id = me.id;
        let near = Agent::spawn("near", Position::new(1, 1), 1);
        let doomed = Agent::spawn("doomed", Position::new(2, 0), 1);
        let doomed_id = doomed.id;
        registry.insert(me).unwrap();
        registry.insert(near).unwrap();
        registry.insert(doomed).unwrap();
        registry.kill(doomed_id, 2).unwrap();

        let seen = registry.living_within(Position::new(0, 0), 5.0, my_id);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, "near");
    }
}
