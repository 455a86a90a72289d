//! The saga chronicler: closes eras and writes narrative chapters.
//!
//! An era covers a fixed span of ticks; era N covers ticks
//! `(N-1) * len + 1 ..= N * len`. Chapters are write-once and contiguous:
//! the chronicler closes every era due up to the current tick, in order,
//! and a failed narration leaves the era pending for the next cycle rather
//! than skipping it.

use chrono::Utc;

use perpetua_events::EventLog;
use perpetua_oracle::{DailyBudget, Oracle};
use perpetua_types::{AgentId, EraStatistics, EventDraft, EventType, SagaChapter};
use perpetua_world::WorldState;

use crate::storage::{Repository, StorageError};

/// How many event titles a chapter highlights.
const KEY_EVENT_LIMIT: usize = 5;
/// How many agents a chapter names.
const KEY_CHARACTER_LIMIT: usize = 3;

/// Era bookkeeping for the engine.
#[derive(Debug, Clone, Copy)]
pub struct Chronicler {
    era_length_ticks: u64,
}

impl Chronicler {
    /// Create a chronicler with the configured era length.
    pub const fn new(era_length_ticks: u64) -> Self {
        Self { era_length_ticks }
    }

    /// The number of fully elapsed eras at a tick.
    pub const fn eras_due(&self, tick: u64) -> u64 {
        if self.era_length_ticks == 0 {
            0
        } else {
            tick / self.era_length_ticks
        }
    }

    /// The tick span covered by an era number (starting at 1).
    pub const fn span_of(&self, era_number: u64) -> (u64, u64) {
        let end = era_number.saturating_mul(self.era_length_ticks);
        let start = end.saturating_sub(self.era_length_ticks).saturating_add(1);
        (start, end)
    }

    /// Close every era due at `tick` that has no chapter yet, oldest
    /// first. Returns the `EraClosed` drafts for the next seal.
    ///
    /// Narration failures stop the loop and leave the remaining eras
    /// pending; the next cycle retries them. Contiguity is preserved
    /// because eras close strictly in order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the repository fails; a duplicate
    /// chapter (another writer won the race) is treated as already closed.
    pub async fn close_due_eras<O: Oracle, R: Repository>(
        &self,
        oracle: &O,
        repository: &R,
        budget: &DailyBudget,
        world: &WorldState,
        log: &EventLog,
        tick: u64,
    ) -> Result<Vec<EventDraft>, StorageError> {
        let due = self.eras_due(tick);
        let written = repository.latest_era().await?.unwrap_or(0);
        let mut drafts = Vec::new();

        let mut era_number = written.saturating_add(1);
        while era_number <= due {
            if repository.chapter_exists(era_number).await? {
                era_number = era_number.saturating_add(1);
                continue;
            }
            match self
                .write_chapter(oracle, repository, budget, world, log, era_number)
                .await
            {
                Ok(draft) => drafts.push(draft),
                Err(ChapterFailure::Storage(StorageError::DuplicateChapter(_))) => {}
                Err(ChapterFailure::Storage(error)) => return Err(error),
                Err(ChapterFailure::Narration) => break,
            }
            era_number = era_number.saturating_add(1);
        }

        Ok(drafts)
    }

    async fn write_chapter<O: Oracle, R: Repository>(
        &self,
        oracle: &O,
        repository: &R,
        budget: &DailyBudget,
        world: &WorldState,
        log: &EventLog,
        era_number: u64,
    ) -> Result<EventDraft, ChapterFailure> {
        let (start_tick, end_tick) = self.span_of(era_number);
        let statistics = aggregate_statistics(world, log, start_tick, end_tick);
        let key_events = key_events(log, start_tick, end_tick);
        let key_characters = key_characters(world, log, start_tick, end_tick);

        let summary = format!(
            "Era {era_number}: {births} births, {deaths} deaths, {concepts} concepts coined",
            births = statistics.births,
            deaths = statistics.deaths,
            concepts = statistics.concepts_created,
        );
        let prompt = narration_prompt(era_number, start_tick, end_tick, &statistics, &key_events);

        if budget.is_exhausted() {
            tracing::warn!(era_number, "daily budget exhausted, deferring narration");
            return Err(ChapterFailure::Narration);
        }
        let started = std::time::Instant::now();
        let (narrative, cost) = match oracle.narrate(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(era_number, %error, "era narration failed, will retry");
                return Err(ChapterFailure::Narration);
            }
        };
        budget.charge(cost);
        let generation_time_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let chapter = SagaChapter {
            era_number,
            start_tick,
            end_tick,
            narrative,
            summary: summary.clone(),
            statistics,
            key_events,
            key_characters,
            generation_time_ms,
            created_at: Utc::now(),
        };
        repository
            .save_chapter(&chapter)
            .await
            .map_err(ChapterFailure::Storage)?;

        tracing::info!(
            era_number,
            start_tick,
            end_tick,
            deaths = statistics.deaths,
            concepts = statistics.concepts_created,
            "era closed"
        );
        Ok(EventDraft::new(
            EventType::EraClosed,
            7,
            format!("Era {era_number} closed"),
            summary,
        ))
    }
}

enum ChapterFailure {
    Storage(StorageError),
    Narration,
}

/// Aggregate era statistics from the committed event log.
fn aggregate_statistics(
    world: &WorldState,
    log: &EventLog,
    start_tick: u64,
    end_tick: u64,
) -> EraStatistics {
    let mut stats = EraStatistics::default();
    for event in log.range(start_tick, end_tick) {
        match event.event_type {
            EventType::AgentSpawned | EventType::Genesis => {
                stats.births = stats
                    .births
                    .saturating_add(u32::try_from(event.agent_ids.len()).unwrap_or(u32::MAX));
            }
            EventType::AgentDied => stats.deaths = stats.deaths.saturating_add(1),
            EventType::ConceptCreated => {
                stats.concepts_created = stats.concepts_created.saturating_add(1);
            }
            _ => {}
        }
        if event.agent_ids.len() >= 2 {
            stats.interactions = stats.interactions.saturating_add(1);
        }
    }
    stats.end_agent_count = u32::try_from(world.agents.living_count()).unwrap_or(u32::MAX);
    stats.start_agent_count = stats
        .end_agent_count
        .saturating_add(stats.deaths)
        .saturating_sub(stats.births);
    stats
}

/// The era's most significant event titles, importance first.
fn key_events(log: &EventLog, start_tick: u64, end_tick: u64) -> Vec<String> {
    let mut events = log.range(start_tick, end_tick);
    events.sort_by(|a, b| {
        b.importance
            .cmp(&a.importance)
            .then(a.tick.cmp(&b.tick))
            .then(a.sequence.cmp(&b.sequence))
    });
    events
        .into_iter()
        .take(KEY_EVENT_LIMIT)
        .map(|event| event.title.clone())
        .collect()
}

/// The era's most involved agents, by event participation count.
fn key_characters(
    world: &WorldState,
    log: &EventLog,
    start_tick: u64,
    end_tick: u64,
) -> Vec<String> {
    let mut counts: std::collections::BTreeMap<AgentId, u32> = std::collections::BTreeMap::new();
    for event in log.range(start_tick, end_tick) {
        for agent_id in &event.agent_ids {
            let count = counts.entry(*agent_id).or_insert(0);
            *count = count.saturating_add(1);
        }
    }
    let mut ranked: Vec<(AgentId, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(KEY_CHARACTER_LIMIT)
        .filter_map(|(agent_id, _)| world.agents.get(agent_id).map(|agent| agent.name.clone()))
        .collect()
}

/// Build the narration prompt handed to the oracle.
fn narration_prompt(
    era_number: u64,
    start_tick: u64,
    end_tick: u64,
    statistics: &EraStatistics,
    key_events: &[String],
) -> String {
    let highlights = if key_events.is_empty() {
        String::from("nothing of note was recorded")
    } else {
        key_events.join("; ")
    };
    format!(
        "Write a short mythic chronicle of era {era_number} of a persistent world, \
         covering ticks {start_tick} to {end_tick}. \
         {births} agents were born and {deaths} died; \
         {concepts} concepts were coined. Notable happenings: {highlights}.",
        births = statistics.births,
        deaths = statistics.deaths,
        concepts = statistics.concepts_created,
    )
}
