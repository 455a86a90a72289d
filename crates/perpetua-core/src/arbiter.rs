//! The action arbitrator: strictly sequential, deterministic application
//! of one tick's proposals.
//!
//! Proposals are processed in `(sequence, agent_id)` order. Exclusive
//! targets (a voxel cell, a feature) are claimed by the first accepted
//! proposal that touches them; later proposals touching the same target
//! are rejected with `Conflict`. Validity consults the effective god rules
//! snapshotted at batch start. A per-proposal apply error is isolated as
//! `Rejected: Error` and never aborts the batch.

use std::collections::BTreeSet;

use perpetua_types::{
    ActionProposal, AgentId, Block, Concept, EventDraft, EventType, ProposedAction,
    RejectionReason, TargetKey,
};
use perpetua_world::{EffectiveRules, Placement, WorldError, WorldState};

/// Energy drained by every accepted non-observe action.
const ACTION_ENERGY_COST: u32 = 1;
/// Energy ceiling.
const MAX_ENERGY: u32 = 100;

/// The audit outcome of one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome {
    /// The proposal was applied.
    Accepted,
    /// The proposal was rejected with a structured reason.
    Rejected(RejectionReason),
}

/// Everything one arbitration batch produced.
#[derive(Debug, Default)]
pub struct ArbitrationOutcome {
    /// Per-proposal outcomes in processing order.
    pub outcomes: Vec<(AgentId, ProposalOutcome)>,
    /// Event drafts for the log, in emission order.
    pub drafts: Vec<EventDraft>,
}

impl ArbitrationOutcome {
    /// Number of accepted proposals.
    pub fn accepted_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == ProposalOutcome::Accepted)
            .count()
    }
}

/// Arbitrate one tick's batch against the world.
///
/// `proposals` are re-sorted defensively; the pipeline already orders
/// them. The world is mutated in place -- callers wanting retry safety
/// arbitrate against a clone and swap on success.
pub fn arbitrate(
    world: &mut WorldState,
    mut proposals: Vec<ActionProposal>,
    tick: u64,
) -> ArbitrationOutcome {
    proposals.sort_by_key(ActionProposal::ordering_key);
    let rules = world.rules.effective();

    let mut outcome = ArbitrationOutcome::default();
    let mut claimed: BTreeSet<TargetKey> = BTreeSet::new();

    for proposal in proposals {
        let agent_id = proposal.agent_id;
        let result = apply_proposal(world, &rules, &mut claimed, &proposal, tick, &mut outcome.drafts);
        match result {
            Ok(()) => outcome.outcomes.push((agent_id, ProposalOutcome::Accepted)),
            Err(reason) => {
                tracing::debug!(
                    %agent_id,
                    tick,
                    action = proposal.action.label(),
                    reason = reason.as_str(),
                    "proposal rejected"
                );
                outcome.drafts.push(rejection_draft(&proposal, reason));
                outcome
                    .outcomes
                    .push((agent_id, ProposalOutcome::Rejected(reason)));
            }
        }
    }

    outcome
}

/// Validate and apply one proposal. Returns the rejection reason on any
/// failure; the world is only mutated on the success path.
fn apply_proposal(
    world: &mut WorldState,
    rules: &EffectiveRules,
    claimed: &mut BTreeSet<TargetKey>,
    proposal: &ActionProposal,
    tick: u64,
    drafts: &mut Vec<EventDraft>,
) -> Result<(), RejectionReason> {
    let agent_id = proposal.agent_id;
    let Some(agent) = world.agents.get(agent_id) else {
        return Err(RejectionReason::Invalid);
    };
    if !agent.alive {
        return Err(RejectionReason::Invalid);
    }
    let agent_position = agent.position;
    let agent_name = agent.name.clone();

    // First accepted toucher of an exclusive target wins the tick.
    if let Some(key) = proposal.action.exclusive_target()
        && claimed.contains(&key)
    {
        return Err(RejectionReason::Conflict);
    }

    match &proposal.action {
        ProposedAction::Observe => {}
        ProposedAction::Move { to } => {
            if !world.in_bounds(*to) {
                return Err(RejectionReason::OutOfBounds);
            }
            if agent_position.distance(*to) > rules.agent_move_range() {
                return Err(RejectionReason::OutOfBounds);
            }
            let agent = world.agents.get_mut(agent_id).map_err(apply_error)?;
            agent.position = *to;
        }
        ProposedAction::PlaceBlock { at, kind } => {
            if !world.in_bounds(*at) {
                return Err(RejectionReason::OutOfBounds);
            }
            let block = Block {
                kind: kind.clone(),
                placed_by: Some(agent_id),
                placed_at_tick: tick,
            };
            match world.grid.place(*at, block) {
                Ok(Placement::Placed) => {
                    drafts.push(
                        EventDraft::new(
                            EventType::WorldMutation,
                            4,
                            format!("{agent_name} placed {kind}"),
                            format!("{agent_name} placed a {kind} block at {at}"),
                        )
                        .with_agent(agent_id)
                        .with_metadata(serde_json::json!({
                            "position": at,
                            "kind": kind,
                        })),
                    );
                }
                // Identical re-placement is an accepted no-op.
                Ok(Placement::AlreadyPresent) => {}
                Err(WorldError::CellOccupied { .. }) => return Err(RejectionReason::Conflict),
                Err(error) => return Err(apply_error(error)),
            }
        }
        ProposedAction::RemoveBlock { at } => match world.grid.remove(*at) {
            Ok(block) => {
                drafts.push(
                    EventDraft::new(
                        EventType::WorldMutation,
                        4,
                        format!("{agent_name} removed {kind}", kind = block.kind),
                        format!(
                            "{agent_name} removed a {kind} block at {at}",
                            kind = block.kind
                        ),
                    )
                    .with_agent(agent_id),
                );
            }
            Err(WorldError::CellVacant(_)) => return Err(RejectionReason::Invalid),
            Err(error) => return Err(apply_error(error)),
        },
        ProposedAction::Gather { feature } => {
            let Some(target) = world.features.get(*feature) else {
                return Err(RejectionReason::Invalid);
            };
            if !target.is_active || agent_position.distance(target.position) > target.radius {
                return Err(RejectionReason::Invalid);
            }
            let taken = world
                .features
                .gather(*feature, rules.gather_yield())
                .map_err(apply_error)?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let restored = taken.round().clamp(0.0, f64::from(MAX_ENERGY)) as u32;
            let agent = world.agents.get_mut(agent_id).map_err(apply_error)?;
            agent.energy = agent.energy.saturating_add(restored).min(MAX_ENERGY);
        }
        ProposedAction::ClaimFeature { feature } => {
            match world.features.claim(*feature, agent_id) {
                Ok(()) => {
                    drafts.push(
                        EventDraft::new(
                            EventType::FeatureClaimed,
                            5,
                            format!("{agent_name} claimed a feature"),
                            format!("{agent_name} claimed exclusive use of feature {feature}"),
                        )
                        .with_agent(agent_id),
                    );
                }
                Err(WorldError::FeatureClaimed { .. }) => return Err(RejectionReason::Conflict),
                Err(WorldError::FeatureNotFound(_)) => return Err(RejectionReason::Invalid),
                Err(error) => return Err(apply_error(error)),
            }
        }
    }

    if let Some(key) = proposal.action.exclusive_target() {
        claimed.insert(key);
    }

    finish_accepted(world, proposal, tick, drafts);
    Ok(())
}

/// Post-acceptance bookkeeping: energy drain, memory, concept coinage.
fn finish_accepted(
    world: &mut WorldState,
    proposal: &ActionProposal,
    tick: u64,
    drafts: &mut Vec<EventDraft>,
) {
    let concept_proposal = proposal.concept.clone();

    if let Ok(agent) = world.agents.get_mut(proposal.agent_id) {
        if !matches!(proposal.action, ProposedAction::Observe) {
            agent.energy = agent.energy.saturating_sub(ACTION_ENERGY_COST);
        }
        if let Some(memory) = &proposal.new_memory {
            agent.memory.push(memory.clone());
        }
        if let Some(concept) = &concept_proposal {
            agent.known_concepts.insert(concept.name.clone());
        }
    }

    if let Some(concept) = concept_proposal {
        let name = concept.name.clone();
        let newly_coined = world.concepts.register(Concept {
            name: name.clone(),
            definition: concept.definition,
            effects: concept.effects,
            coined_by: proposal.agent_id,
            coined_at_tick: tick,
        });
        if newly_coined {
            let coiner = world
                .agents
                .get(proposal.agent_id)
                .map_or_else(String::new, |a| a.name.clone());
            drafts.push(
                EventDraft::new(
                    EventType::ConceptCreated,
                    6,
                    format!("\"{name}\" was coined"),
                    format!("{coiner} coined the concept \"{name}\""),
                )
                .with_agent(proposal.agent_id)
                .with_concept(name),
            );
        }
    }
}

/// Map an unexpected world error to the isolated `Error` rejection.
fn apply_error(error: WorldError) -> RejectionReason {
    tracing::warn!(%error, "proposal apply failed");
    RejectionReason::Error
}

/// Build the audit draft for a rejection.
fn rejection_draft(proposal: &ActionProposal, reason: RejectionReason) -> EventDraft {
    EventDraft::new(
        EventType::ActionRejected,
        2,
        format!("{} rejected", proposal.action.label()),
        format!(
            "proposal by {agent} was rejected: {reason}",
            agent = proposal.agent_id,
            reason = reason.as_str()
        ),
    )
    .with_agent(proposal.agent_id)
    .with_metadata(serde_json::json!({
        "action": proposal.action.label(),
        "reason": reason.as_str(),
        "source": proposal.source.as_str(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use perpetua_types::{
        Agent, ConceptProposal, FeatureId, FeatureKind, Position, ProposalSource, WorldFeature,
    };
    use perpetua_world::{PROP_CAPACITY, PROP_REGEN, PROP_STOCK};

    use super::*;

    fn world_with_agents(count: usize) -> (WorldState, Vec<AgentId>) {
        let mut world = WorldState::new();
        let mut ids = Vec::new();
        for i in 0..count {
            let agent = Agent::spawn(format!("a{i}"), Position::new(0, 0), 1);
            ids.push(agent.id);
            world.agents.insert(agent).unwrap();
        }
        ids.sort_unstable();
        (world, ids)
    }

    fn proposal(
        agent_id: AgentId,
        sequence: u32,
        action: ProposedAction,
    ) -> ActionProposal {
        ActionProposal {
            agent_id,
            tick: 100,
            sequence,
            action,
            new_memory: None,
            concept: None,
            source: ProposalSource::Oracle,
        }
    }

    #[test]
    fn contested_voxel_goes_to_lowest_ordering_key() {
        let (mut world, ids) = world_with_agents(2);
        let at = Position::new(5, 5);
        let proposals = vec![
            proposal(
                ids[1],
                1,
                ProposedAction::PlaceBlock {
                    at,
                    kind: String::from("wood"),
                },
            ),
            proposal(
                ids[0],
                0,
                ProposedAction::PlaceBlock {
                    at,
                    kind: String::from("stone"),
                },
            ),
        ];

        let outcome = arbitrate(&mut world, proposals, 100);

        assert_eq!(outcome.accepted_count(), 1);
        assert_eq!(world.grid.get(at).unwrap().kind, "stone");
        assert_eq!(world.grid.get(at).unwrap().placed_by, Some(ids[0]));
        assert!(outcome.outcomes.iter().any(|(id, o)| {
            *id == ids[1] && *o == ProposalOutcome::Rejected(RejectionReason::Conflict)
        }));
    }

    #[test]
    fn equal_sequence_ties_break_by_agent_id() {
        let (mut world, ids) = world_with_agents(2);
        let at = Position::new(2, 2);
        let proposals = vec![
            proposal(
                ids[1],
                0,
                ProposedAction::PlaceBlock {
                    at,
                    kind: String::from("wood"),
                },
            ),
            proposal(
                ids[0],
                0,
                ProposedAction::PlaceBlock {
                    at,
                    kind: String::from("stone"),
                },
            ),
        ];

        arbitrate(&mut world, proposals, 100);
        assert_eq!(world.grid.get(at).unwrap().placed_by, Some(ids[0]));
    }

    #[test]
    fn identical_replacement_is_accepted_noop() {
        let (mut world, ids) = world_with_agents(1);
        let at = Position::new(1, 1);
        world
            .grid
            .place(
                at,
                Block {
                    kind: String::from("stone"),
                    placed_by: None,
                    placed_at_tick: 1,
                },
            )
            .unwrap();

        let outcome = arbitrate(
            &mut world,
            vec![proposal(
                ids[0],
                0,
                ProposedAction::PlaceBlock {
                    at,
                    kind: String::from("stone"),
                },
            )],
            100,
        );

        assert_eq!(outcome.accepted_count(), 1);
        // No mutation event for the no-op.
        assert!(outcome.drafts.is_empty());
    }

    #[test]
    fn move_beyond_range_is_out_of_bounds() {
        let (mut world, ids) = world_with_agents(1);
        let outcome = arbitrate(
            &mut world,
            vec![proposal(
                ids[0],
                0,
                ProposedAction::Move {
                    to: Position::new(20, 0),
                },
            )],
            100,
        );
        assert_eq!(
            outcome.outcomes[0].1,
            ProposalOutcome::Rejected(RejectionReason::OutOfBounds)
        );
        assert_eq!(
            world.agents.get(ids[0]).unwrap().position,
            Position::new(0, 0)
        );
    }

    #[test]
    fn move_range_widens_with_the_god_rule() {
        let (mut world, ids) = world_with_agents(1);
        world.rules.set_f64(perpetua_world::rules::AGENT_MOVE_RANGE, 16.0);
        let outcome = arbitrate(
            &mut world,
            vec![proposal(
                ids[0],
                0,
                ProposedAction::Move {
                    to: Position::new(15, 0),
                },
            )],
            100,
        );
        assert_eq!(outcome.accepted_count(), 1);
        assert_eq!(
            world.agents.get(ids[0]).unwrap().position,
            Position::new(15, 0)
        );
    }

    #[test]
    fn dead_agents_cannot_act() {
        let (mut world, ids) = world_with_agents(1);
        world.agents.kill(ids[0], 99).unwrap();
        let outcome = arbitrate(
            &mut world,
            vec![proposal(ids[0], 0, ProposedAction::Observe)],
            100,
        );
        assert_eq!(
            outcome.outcomes[0].1,
            ProposalOutcome::Rejected(RejectionReason::Invalid)
        );
    }

    #[test]
    fn gather_restores_energy_and_draws_stock() {
        let (mut world, ids) = world_with_agents(1);
        if let Ok(agent) = world.agents.get_mut(ids[0]) {
            agent.energy = 50;
        }
        let feature = WorldFeature {
            id: FeatureId::new(),
            kind: FeatureKind::Resource,
            position: Position::new(1, 1),
            radius: 3.0,
            properties: BTreeMap::from([
                (String::from(PROP_STOCK), 40.0),
                (String::from(PROP_REGEN), 2.0),
                (String::from(PROP_CAPACITY), 50.0),
            ]),
            claimed_by: None,
            is_active: true,
        };
        let feature_id = feature.id;
        world.features.insert(feature).unwrap();

        let outcome = arbitrate(
            &mut world,
            vec![proposal(
                ids[0],
                0,
                ProposedAction::Gather {
                    feature: feature_id,
                },
            )],
            100,
        );

        assert_eq!(outcome.accepted_count(), 1);
        // Default gather_yield is 10; minus the 1-energy action cost.
        assert_eq!(world.agents.get(ids[0]).unwrap().energy, 59);
        let stock = world.features.get(feature_id).unwrap().property(PROP_STOCK, 0.0);
        assert!((stock - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn contested_feature_gather_rejects_the_later_proposal() {
        let (mut world, ids) = world_with_agents(2);
        let feature = WorldFeature {
            id: FeatureId::new(),
            kind: FeatureKind::Resource,
            position: Position::new(0, 0),
            radius: 3.0,
            properties: BTreeMap::from([(String::from(PROP_STOCK), 40.0)]),
            claimed_by: None,
            is_active: true,
        };
        let feature_id = feature.id;
        world.features.insert(feature).unwrap();

        let outcome = arbitrate(
            &mut world,
            vec![
                proposal(ids[0], 0, ProposedAction::Gather { feature: feature_id }),
                proposal(ids[1], 1, ProposedAction::Gather { feature: feature_id }),
            ],
            100,
        );

        assert_eq!(outcome.accepted_count(), 1);
        assert!(outcome.outcomes.iter().any(|(id, o)| {
            *id == ids[1] && *o == ProposalOutcome::Rejected(RejectionReason::Conflict)
        }));
    }

    #[test]
    fn accepted_concept_is_coined_once() {
        let (mut world, ids) = world_with_agents(2);
        let concept = ConceptProposal {
            name: String::from("fire"),
            definition: String::from("fast oxidation"),
            effects: String::from("warmth"),
        };
        let mut first = proposal(ids[0], 0, ProposedAction::Observe);
        first.concept = Some(concept.clone());
        let mut second = proposal(ids[1], 1, ProposedAction::Observe);
        second.concept = Some(concept);

        let outcome = arbitrate(&mut world, vec![first, second], 100);

        assert_eq!(world.concepts.count(), 1);
        assert_eq!(world.concepts.get("fire").unwrap().coined_by, ids[0]);
        // One coinage event; the second agent still learns the concept.
        let coinages = outcome
            .drafts
            .iter()
            .filter(|d| d.event_type == EventType::ConceptCreated)
            .count();
        assert_eq!(coinages, 1);
        assert!(world.agents.get(ids[1]).unwrap().known_concepts.contains("fire"));
    }

    #[test]
    fn memory_is_applied_on_acceptance_only() {
        let (mut world, ids) = world_with_agents(1);
        let mut rejected = proposal(
            ids[0],
            0,
            ProposedAction::Move {
                to: Position::new(50, 50),
            },
        );
        rejected.new_memory = Some(String::from("I flew across the world"));

        arbitrate(&mut world, vec![rejected], 100);
        assert!(world.agents.get(ids[0]).unwrap().memory.is_empty());
    }
}
