//! The tick scheduler: serialized, gap-free world cycles.
//!
//! One cycle stages a clone of the world, runs wake, the decision
//! pipeline, and arbitration against it, then persists the whole cycle as
//! one batch. Only after a successful persist does the staged world become
//! authoritative and the tick counter advance, so a failed persist leaves
//! no trace and the next interval retries the same tick number with the
//! same eligible agents.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use perpetua_events::EventLog;
use perpetua_oracle::{DailyBudget, Oracle};
use perpetua_types::{Agent, EventDraft, EventType, Perception, TickRecord};
use perpetua_world::{GodRuleRegistry, WorldState};

use crate::arbiter::arbitrate;
use crate::chronicler::Chronicler;
use crate::config::EngineConfig;
use crate::perception::build_perception;
use crate::pipeline::collect_proposals;
use crate::storage::{CycleBatch, Repository, StorageError};

/// What one completed cycle looked like, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSummary {
    /// The tick number this cycle completed.
    pub tick: u64,
    /// Agents that received a decision round.
    pub eligible: usize,
    /// Proposals the arbitrator accepted.
    pub accepted: usize,
    /// Proposals the arbitrator rejected.
    pub rejected: usize,
    /// Events that passed the importance threshold and were recorded.
    pub events_recorded: usize,
    /// Total feature stock regained during wake.
    pub regenerated: f64,
    /// Wall-clock cycle duration in milliseconds.
    pub duration_ms: u64,
}

/// The engine driving the world: owns the authoritative state, the event
/// log, the budget, and the tick counter.
pub struct TickEngine<O, R> {
    oracle: O,
    repository: R,
    config: EngineConfig,
    world: WorldState,
    log: EventLog,
    budget: DailyBudget,
    chronicler: Chronicler,
    current_tick: u64,
    pending_drafts: Vec<EventDraft>,
}

impl<O: Oracle, R: Repository> TickEngine<O, R> {
    /// Create an engine over a fresh, empty world.
    pub fn new(oracle: O, repository: R, config: EngineConfig) -> Self {
        let log = EventLog::new(config.world.event_importance_threshold);
        let budget = DailyBudget::new(config.oracle.daily_budget_usd);
        let chronicler = Chronicler::new(config.world.era_length_ticks);
        Self {
            oracle,
            repository,
            config,
            world: WorldState::new(),
            log,
            budget,
            chronicler,
            current_tick: 0,
            pending_drafts: Vec::new(),
        }
    }

    /// The authoritative world.
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable world access for administrative operations between cycles.
    pub const fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// The committed event log.
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Mutable log access, used to attach subscribers.
    pub const fn log_mut(&mut self) -> &mut EventLog {
        &mut self.log
    }

    /// The daily oracle budget.
    pub const fn budget(&self) -> &DailyBudget {
        &self.budget
    }

    /// The repository backing this engine.
    pub const fn repository(&self) -> &R {
        &self.repository
    }

    /// The oracle backing this engine.
    pub const fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The last completed tick number (0 before the first cycle).
    pub const fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Queue drafts to be sealed with the next cycle's events.
    pub fn queue_drafts(&mut self, drafts: Vec<EventDraft>) {
        self.pending_drafts.extend(drafts);
    }

    /// Restore world state, events, and the tick counter from the
    /// repository. Returns whether any persisted history was found.
    ///
    /// Call before attaching subscribers: the replayed history is not
    /// re-delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the repository cannot be read.
    pub async fn recover(&mut self) -> Result<bool, StorageError> {
        let Some(latest) = self.repository.latest_tick().await? else {
            return Ok(false);
        };
        self.current_tick = latest;

        for agent in self.repository.load_agents().await? {
            if let Err(error) = self.world.agents.insert(agent) {
                tracing::warn!(%error, "skipping agent during recovery");
            }
        }
        for (position, block) in self.repository.load_blocks().await? {
            if let Err(error) = self.world.grid.place(position, block) {
                tracing::warn!(%error, "skipping block during recovery");
            }
        }
        for feature in self.repository.load_features().await? {
            if let Err(error) = self.world.features.insert(feature) {
                tracing::warn!(%error, "skipping feature during recovery");
            }
        }
        for concept in rebuild_concepts(&self.world) {
            self.world.concepts.register(concept);
        }
        self.world.rules =
            GodRuleRegistry::from_overrides(self.repository.load_rule_overrides().await?);
        self.log = EventLog::from_events(
            self.config.world.event_importance_threshold,
            self.repository.load_events().await?,
        );

        tracing::info!(
            tick = latest,
            agents = self.world.agents.total_count(),
            events = self.log.len(),
            "recovered persisted world"
        );
        Ok(true)
    }

    /// Run one complete tick cycle.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when persisting the cycle fails; the world
    /// and the tick counter are left untouched so the tick can be retried.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, StorageError> {
        let started = std::time::Instant::now();
        let tick = self.current_tick.saturating_add(1);

        let mut staged = self.world.clone();
        let mut drafts = std::mem::take(&mut self.pending_drafts);

        let regenerated = staged.wake();
        drafts.extend(starvation_deaths(&mut staged, tick));

        let eligible = eligible_agents(&staged, tick, self.config.world.think_interval_ticks);
        let perceptions: Vec<Perception> = eligible
            .iter()
            .map(|agent| {
                build_perception(
                    &staged,
                    agent,
                    tick,
                    self.config.world.perception_radius,
                    self.config.world.memory_excerpt_len,
                )
            })
            .collect();

        let proposals =
            collect_proposals(&self.oracle, &self.budget, &self.config.pipeline, perceptions)
                .await;
        let proposal_count = proposals.len();

        let outcome = arbitrate(&mut staged, proposals, tick);
        let accepted = outcome.accepted_count();
        drafts.extend(outcome.drafts);

        for agent in &eligible {
            if let Ok(entry) = staged.agents.get_mut(agent.id) {
                entry.last_decision_tick = Some(tick);
            }
        }

        let sealed = self.log.seal(tick, drafts);
        let events_recorded = sealed.len();

        let batch = CycleBatch {
            tick: TickRecord {
                number: tick,
                snapshot: staged.snapshot(),
                agent_count: u32::try_from(staged.agents.living_count()).unwrap_or(u32::MAX),
                concept_count: u32::try_from(staged.concepts.count()).unwrap_or(u32::MAX),
                processing_time_ms: u64::try_from(started.elapsed().as_millis())
                    .unwrap_or(u64::MAX),
                completed_at: chrono::Utc::now(),
            },
            agents: staged.agents.iter().cloned().collect(),
            blocks: staged
                .grid
                .iter()
                .map(|(position, block)| (position, block.clone()))
                .collect(),
            features: staged.features.iter().cloned().collect(),
            events: sealed.clone(),
        };
        if let Err(error) = self.repository.persist_cycle(&batch).await {
            tracing::error!(tick, %error, "cycle persistence failed, tick will be retried");
            return Err(error);
        }

        self.log.commit(sealed);
        self.world = staged;
        self.current_tick = tick;

        // Era closing is best-effort here; a failure leaves the era
        // pending and the next cycle retries it.
        match self
            .chronicler
            .close_due_eras(
                &self.oracle,
                &self.repository,
                &self.budget,
                &self.world,
                &self.log,
                tick,
            )
            .await
        {
            Ok(era_drafts) => self.pending_drafts.extend(era_drafts),
            Err(error) => tracing::warn!(tick, %error, "era closing deferred"),
        }

        let summary = CycleSummary {
            tick,
            eligible: eligible.len(),
            accepted,
            rejected: proposal_count.saturating_sub(accepted),
            events_recorded,
            regenerated,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        tracing::info!(
            tick,
            eligible = summary.eligible,
            accepted = summary.accepted,
            rejected = summary.rejected,
            events = summary.events_recorded,
            duration_ms = summary.duration_ms,
            "tick completed"
        );
        Ok(summary)
    }

    /// Drive cycles at the configured interval until `shutdown` resolves.
    ///
    /// Cycles never overlap: the next one starts only after the previous
    /// finished, and a slow cycle delays rather than stacks intervals.
    /// Shutdown is graceful by construction -- it is only observed between
    /// cycles, so an in-flight tick always completes and persists.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(Duration::from_millis(
            self.config.world.tick_interval_ms.max(1),
        ));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!(tick = self.current_tick, "shutdown requested");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(error) = self.run_cycle().await {
                        tracing::error!(%error, "cycle failed, retrying next interval");
                    }
                }
            }
        }
    }
}

/// Kill agents that ran out of energy, returning their death drafts.
fn starvation_deaths(world: &mut WorldState, tick: u64) -> Vec<EventDraft> {
    let mut drafts = Vec::new();
    for id in world.agents.living_ids() {
        let Some(agent) = world.agents.get(id) else {
            continue;
        };
        if agent.energy > 0 {
            continue;
        }
        let name = agent.name.clone();
        if world.agents.kill(id, tick).unwrap_or(false) {
            tracing::info!(agent_id = %id, tick, "agent starved");
            drafts.push(
                EventDraft::new(
                    EventType::AgentDied,
                    8,
                    format!("{name} died"),
                    format!("{name} ran out of energy and died at tick {tick}"),
                )
                .with_agent(id),
            );
        }
    }
    drafts
}

/// Living agents due for a decision round this tick, in scan order.
fn eligible_agents(world: &WorldState, tick: u64, think_interval: u64) -> Vec<Agent> {
    let mut eligible = Vec::new();
    for id in world.agents.living_ids() {
        let Some(agent) = world.agents.get(id) else {
            continue;
        };
        let due = agent
            .last_decision_tick
            .is_none_or(|last| tick.saturating_sub(last) >= think_interval);
        if due {
            eligible.push(agent.clone());
        }
    }
    eligible
}

/// Rebuild the concept registry from agent knowledge after recovery.
///
/// Persisted concepts live in event metadata rather than a dedicated
/// table; the registry only needs name uniqueness, so coinage provenance
/// is reconstructed from the earliest-born knower.
fn rebuild_concepts(world: &WorldState) -> Vec<perpetua_types::Concept> {
    let mut concepts: std::collections::BTreeMap<String, perpetua_types::Concept> =
        std::collections::BTreeMap::new();
    for agent in world.agents.iter() {
        for name in &agent.known_concepts {
            concepts
                .entry(name.clone())
                .or_insert_with(|| perpetua_types::Concept {
                    name: name.clone(),
                    definition: String::new(),
                    effects: String::new(),
                    coined_by: agent.id,
                    coined_at_tick: agent.born_at_tick,
                });
        }
    }
    concepts.into_values().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use perpetua_oracle::ObserveOracle;
    use perpetua_types::Position;

    use crate::storage::MemoryRepository;

    use super::*;

    fn fast_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.world.era_length_ticks = 1_000;
        config.pipeline.oracle_call_timeout_ms = 100;
        config.pipeline.pipeline_deadline_ms = 500;
        config
    }

    fn engine_with_agents(
        count: usize,
    ) -> TickEngine<ObserveOracle, MemoryRepository> {
        let mut engine = TickEngine::new(ObserveOracle, MemoryRepository::new(), fast_config());
        for i in 0..count {
            engine
                .world_mut()
                .agents
                .insert(Agent::spawn(format!("a{i}"), Position::new(0, 0), 0))
                .unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn ticks_are_sequential_and_gap_free() {
        let mut engine = engine_with_agents(2);
        for expected in 1..=3 {
            let summary = engine.run_cycle().await.unwrap();
            assert_eq!(summary.tick, expected);
        }
        let numbers: Vec<u64> = engine
            .repository()
            .ticks()
            .iter()
            .map(|t| t.number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(engine.current_tick(), 3);
    }

    #[tokio::test]
    async fn failed_persist_leaves_no_trace_and_retries() {
        let mut engine = engine_with_agents(1);
        engine.repository().fail_persists(true);

        assert!(engine.run_cycle().await.is_err());
        assert_eq!(engine.current_tick(), 0);
        assert!(engine.log().is_empty());
        let untouched = engine.world().agents.iter().next().unwrap();
        assert_eq!(untouched.last_decision_tick, None);

        engine.repository().fail_persists(false);
        let summary = engine.run_cycle().await.unwrap();
        // Same tick number, same agent re-decided.
        assert_eq!(summary.tick, 1);
        assert_eq!(summary.eligible, 1);
        let decided = engine.world().agents.iter().next().unwrap();
        assert_eq!(decided.last_decision_tick, Some(1));
    }

    #[tokio::test]
    async fn think_interval_gates_eligibility() {
        let mut engine = engine_with_agents(1);
        engine.config.world.think_interval_ticks = 2;

        let first = engine.run_cycle().await.unwrap();
        assert_eq!(first.eligible, 1);
        let second = engine.run_cycle().await.unwrap();
        assert_eq!(second.eligible, 0);
        let third = engine.run_cycle().await.unwrap();
        assert_eq!(third.eligible, 1);
    }

    #[tokio::test]
    async fn starved_agents_die_during_wake() {
        let mut engine = engine_with_agents(0);
        let mut agent = Agent::spawn("Moss", Position::new(0, 0), 0);
        agent.energy = 0;
        let id = agent.id;
        engine.world_mut().agents.insert(agent).unwrap();

        engine.run_cycle().await.unwrap();

        let dead = engine.world().agents.get(id).unwrap();
        assert!(!dead.alive);
        assert_eq!(dead.died_at_tick, Some(1));
        assert!(engine
            .log()
            .iter()
            .any(|e| e.event_type == EventType::AgentDied));
        // Death is one-way; a second cycle records nothing new.
        engine.run_cycle().await.unwrap();
        let deaths = engine
            .log()
            .iter()
            .filter(|e| e.event_type == EventType::AgentDied)
            .count();
        assert_eq!(deaths, 1);
    }

    #[tokio::test]
    async fn recovery_resumes_from_the_persisted_tick() {
        let repo = std::sync::Arc::new(MemoryRepository::new());

        let mut engine = TickEngine::new(ObserveOracle, std::sync::Arc::clone(&repo), fast_config());
        engine
            .world_mut()
            .agents
            .insert(Agent::spawn("Vex", Position::new(1, 1), 0))
            .unwrap();
        engine.run_cycle().await.unwrap();
        engine.run_cycle().await.unwrap();
        drop(engine);

        let mut restored =
            TickEngine::new(ObserveOracle, std::sync::Arc::clone(&repo), fast_config());
        assert!(restored.recover().await.unwrap());
        assert_eq!(restored.current_tick(), 2);
        assert_eq!(restored.world().agents.total_count(), 1);

        // The next cycle continues the sequence without a gap.
        let summary = restored.run_cycle().await.unwrap();
        assert_eq!(summary.tick, 3);
        let numbers: Vec<u64> = repo.ticks().iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fresh_repository_reports_no_history() {
        let mut engine = engine_with_agents(0);
        assert!(!engine.recover().await.unwrap());
        assert_eq!(engine.current_tick(), 0);
    }
}
