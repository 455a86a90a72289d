//! The decision pipeline: bounded-concurrency oracle calls with fallbacks.
//!
//! Every eligible agent gets exactly one proposal per tick. Sequence
//! numbers are assigned in eligibility-scan order before any call is
//! made, so arbitration order never depends on completion order. Oracle
//! failures, timeouts, and budget exhaustion all degrade to the zero-cost
//! observe fallback; nothing on this path can fail the tick.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;

use perpetua_oracle::{DailyBudget, Oracle};
use perpetua_types::{ActionProposal, Perception, ProposalSource};

use crate::config::PipelineConfig;

/// Run the pipeline for one tick's eligible agents.
///
/// `perceptions` must be in eligibility-scan order; the returned proposals
/// are sorted by `(sequence, agent_id)`, ready for arbitration.
pub async fn collect_proposals<O: Oracle>(
    oracle: &O,
    budget: &DailyBudget,
    config: &PipelineConfig,
    perceptions: Vec<Perception>,
) -> Vec<ActionProposal> {
    let deadline = Instant::now()
        .checked_add(Duration::from_millis(config.pipeline_deadline_ms))
        .unwrap_or_else(Instant::now);
    let call_timeout = Duration::from_millis(config.oracle_call_timeout_ms);

    let mut proposals: Vec<ActionProposal> = futures::stream::iter(
        perceptions
            .into_iter()
            .enumerate()
            .map(|(index, perception)| {
                let sequence = u32::try_from(index).unwrap_or(u32::MAX);
                decide_one(oracle, budget, deadline, call_timeout, sequence, perception)
            }),
    )
    .buffer_unordered(config.oracle_concurrency.max(1))
    .collect()
    .await;

    proposals.sort_by_key(ActionProposal::ordering_key);
    proposals
}

/// Produce one proposal for one agent, never failing.
async fn decide_one<O: Oracle>(
    oracle: &O,
    budget: &DailyBudget,
    deadline: Instant,
    call_timeout: Duration,
    sequence: u32,
    perception: Perception,
) -> ActionProposal {
    let agent_id = perception.self_view.id;
    let tick = perception.tick;

    if budget.is_exhausted() {
        return ActionProposal::fallback(agent_id, tick, sequence, ProposalSource::BudgetFallback);
    }

    // The effective timeout is the per-call limit or whatever remains of
    // the pipeline deadline, whichever is sooner.
    let call_deadline = Instant::now()
        .checked_add(call_timeout)
        .map_or(deadline, |at| at.min(deadline));

    match tokio::time::timeout_at(call_deadline, oracle.decide(&perception)).await {
        Ok(Ok(decision)) => {
            budget.charge(decision.cost);
            ActionProposal {
                agent_id,
                tick,
                sequence,
                action: decision.action,
                new_memory: decision.new_memory,
                concept: decision.concept,
                source: ProposalSource::Oracle,
            }
        }
        Ok(Err(error)) => {
            tracing::warn!(%agent_id, tick, %error, "oracle call failed, observing");
            ActionProposal::fallback(agent_id, tick, sequence, ProposalSource::ErrorFallback)
        }
        Err(_) => {
            tracing::warn!(%agent_id, tick, "oracle call timed out, observing");
            ActionProposal::fallback(agent_id, tick, sequence, ProposalSource::TimeoutFallback)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use perpetua_oracle::{Behavior, ScriptedOracle};
    use perpetua_types::{AgentId, Position, ProposedAction, SelfView};

    use super::*;

    fn perception_for(agent_id: AgentId, tick: u64) -> Perception {
        Perception {
            tick,
            self_view: SelfView {
                id: agent_id,
                name: String::from("t"),
                position: Position::new(0, 0),
                energy: 100,
                memory_excerpt: Vec::new(),
                state_ext: BTreeMap::new(),
            },
            nearby_agents: Vec::new(),
            nearby_features: Vec::new(),
            nearby_blocks: Vec::new(),
            known_concepts: Vec::new(),
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            oracle_concurrency: 2,
            oracle_call_timeout_ms: 1_000,
            pipeline_deadline_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn one_proposal_per_agent_in_scan_order() {
        let oracle = ScriptedOracle::new();
        let budget = DailyBudget::new(dec!(10));
        let agents: Vec<AgentId> = (0..3).map(|_| AgentId::new()).collect();
        let perceptions = agents.iter().map(|id| perception_for(*id, 7)).collect();

        let proposals = collect_proposals(&oracle, &budget, &test_config(), perceptions).await;

        assert_eq!(proposals.len(), 3);
        for (index, proposal) in proposals.iter().enumerate() {
            assert_eq!(proposal.sequence, u32::try_from(index).unwrap());
            assert_eq!(proposal.agent_id, agents[index]);
            assert_eq!(proposal.tick, 7);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_becomes_timeout_fallback() {
        let oracle = ScriptedOracle::new();
        let budget = DailyBudget::new(dec!(10));
        let hung = AgentId::new();
        oracle.script(hung, Behavior::Hang);
        let fine = AgentId::new();
        oracle.script(
            fine,
            Behavior::act(ProposedAction::Move {
                to: Position::new(1, 0),
            }),
        );

        let perceptions = vec![perception_for(hung, 1), perception_for(fine, 1)];
        let proposals = collect_proposals(&oracle, &budget, &test_config(), perceptions).await;

        let by_agent: BTreeMap<AgentId, &ActionProposal> =
            proposals.iter().map(|p| (p.agent_id, p)).collect();
        assert_eq!(by_agent[&hung].source, ProposalSource::TimeoutFallback);
        assert_eq!(by_agent[&hung].action, ProposedAction::Observe);
        assert_eq!(by_agent[&fine].source, ProposalSource::Oracle);
    }

    #[tokio::test]
    async fn failed_call_becomes_error_fallback() {
        let oracle = ScriptedOracle::new();
        let budget = DailyBudget::new(dec!(10));
        let agent = AgentId::new();
        oracle.script(agent, Behavior::Fail);

        let proposals =
            collect_proposals(&oracle, &budget, &test_config(), vec![perception_for(agent, 1)])
                .await;
        assert_eq!(proposals[0].source, ProposalSource::ErrorFallback);
        assert_eq!(proposals[0].action, ProposedAction::Observe);
    }

    #[tokio::test]
    async fn exhausted_budget_skips_paid_calls() {
        let oracle = ScriptedOracle::new();
        let budget = DailyBudget::new(Decimal::ZERO);
        let agent = AgentId::new();
        // Scripted action would be taken if the call were made.
        oracle.script(
            agent,
            Behavior::act(ProposedAction::Move {
                to: Position::new(1, 0),
            }),
        );

        let proposals =
            collect_proposals(&oracle, &budget, &test_config(), vec![perception_for(agent, 1)])
                .await;
        assert_eq!(proposals[0].source, ProposalSource::BudgetFallback);
        assert_eq!(proposals[0].action, ProposedAction::Observe);
    }

    #[tokio::test]
    async fn oracle_costs_are_charged() {
        let oracle = ScriptedOracle::new();
        let budget = DailyBudget::new(dec!(1.00));
        let agent = AgentId::new();
        oracle.script(
            agent,
            Behavior::Act {
                action: ProposedAction::Observe,
                memory: None,
                concept: None,
                cost: dec!(0.25),
            },
        );

        collect_proposals(&oracle, &budget, &test_config(), vec![perception_for(agent, 1)]).await;
        assert_eq!(budget.summary().spent, dec!(0.25));
    }
}
