//! The persistence seam: the [`Repository`] trait and its in-memory
//! implementation.
//!
//! The world is authoritative in memory during a run; the repository is a
//! write-behind journal used for restart recovery and history. The
//! scheduler persists one [`CycleBatch`] per tick -- implementations must
//! apply a batch atomically (all or nothing), because a partially
//! persisted cycle would be replayed inconsistently.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use perpetua_types::{Agent, Block, Event, Position, SagaChapter, TickRecord, WorldFeature};

/// Errors raised by a repository.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A chapter for this era already exists (write-once violation).
    #[error("chapter for era {0} already exists")]
    DuplicateChapter(u64),
}

/// Everything one completed tick writes, applied atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleBatch {
    /// The tick record.
    pub tick: TickRecord,
    /// Full current agent set.
    pub agents: Vec<Agent>,
    /// Full current occupied voxel set.
    pub blocks: Vec<(Position, Block)>,
    /// Full current feature set.
    pub features: Vec<WorldFeature>,
    /// Events sealed for this tick.
    pub events: Vec<Event>,
}

/// Async persistence backend for the engine.
///
/// Uses return-position `impl Future` with explicit `Send` bounds so the
/// scheduler can stay generic without boxing.
pub trait Repository: Send + Sync {
    /// Atomically persist one completed cycle.
    fn persist_cycle(
        &self,
        batch: &CycleBatch,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// The highest persisted tick number, if any.
    fn latest_tick(&self) -> impl Future<Output = Result<Option<u64>, StorageError>> + Send;

    /// Load the full agent set for restart recovery.
    fn load_agents(&self) -> impl Future<Output = Result<Vec<Agent>, StorageError>> + Send;

    /// Load the full event history for restart recovery.
    fn load_events(&self) -> impl Future<Output = Result<Vec<Event>, StorageError>> + Send;

    /// Load the occupied voxel set for restart recovery.
    fn load_blocks(
        &self,
    ) -> impl Future<Output = Result<Vec<(Position, Block)>, StorageError>> + Send;

    /// Load the full feature set for restart recovery.
    fn load_features(&self) -> impl Future<Output = Result<Vec<WorldFeature>, StorageError>> + Send;

    /// Load persisted god-rule overrides.
    fn load_rule_overrides(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<String, serde_json::Value>, StorageError>> + Send;

    /// Persist one god-rule override.
    fn save_rule_override(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Whether a chapter exists for an era.
    fn chapter_exists(
        &self,
        era_number: u64,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// The highest era number with a chapter, if any.
    fn latest_era(&self) -> impl Future<Output = Result<Option<u64>, StorageError>> + Send;

    /// Persist a chapter. Write-once per era.
    fn save_chapter(
        &self,
        chapter: &SagaChapter,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<R: Repository> Repository for std::sync::Arc<R> {
    fn persist_cycle(
        &self,
        batch: &CycleBatch,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).persist_cycle(batch)
    }

    fn latest_tick(&self) -> impl Future<Output = Result<Option<u64>, StorageError>> + Send {
        (**self).latest_tick()
    }

    fn load_agents(&self) -> impl Future<Output = Result<Vec<Agent>, StorageError>> + Send {
        (**self).load_agents()
    }

    fn load_events(&self) -> impl Future<Output = Result<Vec<Event>, StorageError>> + Send {
        (**self).load_events()
    }

    fn load_blocks(
        &self,
    ) -> impl Future<Output = Result<Vec<(Position, Block)>, StorageError>> + Send {
        (**self).load_blocks()
    }

    fn load_features(&self) -> impl Future<Output = Result<Vec<WorldFeature>, StorageError>> + Send {
        (**self).load_features()
    }

    fn load_rule_overrides(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<String, serde_json::Value>, StorageError>> + Send
    {
        (**self).load_rule_overrides()
    }

    fn save_rule_override(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).save_rule_override(key, value)
    }

    fn chapter_exists(
        &self,
        era_number: u64,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send {
        (**self).chapter_exists(era_number)
    }

    fn latest_era(&self) -> impl Future<Output = Result<Option<u64>, StorageError>> + Send {
        (**self).latest_era()
    }

    fn save_chapter(
        &self,
        chapter: &SagaChapter,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).save_chapter(chapter)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    ticks: Vec<TickRecord>,
    agents: Vec<Agent>,
    blocks: Vec<(Position, Block)>,
    features: Vec<WorldFeature>,
    events: Vec<Event>,
    rule_overrides: BTreeMap<String, serde_json::Value>,
    chapters: BTreeMap<u64, SagaChapter>,
}

/// In-memory repository used by tests and database-less runs.
///
/// `fail_persists` injects cycle persistence failures so tests can
/// exercise the scheduler's retry path.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryInner>,
    fail_persists: AtomicBool,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `persist_cycle` fail (or succeed again).
    pub fn fail_persists(&self, fail: bool) {
        self.fail_persists.store(fail, Ordering::SeqCst);
    }

    /// Persisted tick records, oldest first.
    pub fn ticks(&self) -> Vec<TickRecord> {
        self.inner
            .lock()
            .map(|inner| inner.ticks.clone())
            .unwrap_or_default()
    }

    /// Persisted chapters in era order.
    pub fn chapters(&self) -> Vec<SagaChapter> {
        self.inner
            .lock()
            .map(|inner| inner.chapters.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend(String::from("memory repository poisoned")))
    }
}

impl Repository for MemoryRepository {
    async fn persist_cycle(&self, batch: &CycleBatch) -> Result<(), StorageError> {
        if self.fail_persists.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(String::from(
                "injected persistence failure",
            )));
        }
        let mut inner = self.lock()?;
        inner.ticks.push(batch.tick.clone());
        inner.agents = batch.agents.clone();
        inner.blocks = batch.blocks.clone();
        inner.features = batch.features.clone();
        inner.events.extend(batch.events.iter().cloned());
        Ok(())
    }

    async fn latest_tick(&self) -> Result<Option<u64>, StorageError> {
        Ok(self.lock()?.ticks.last().map(|t| t.number))
    }

    async fn load_agents(&self) -> Result<Vec<Agent>, StorageError> {
        Ok(self.lock()?.agents.clone())
    }

    async fn load_events(&self) -> Result<Vec<Event>, StorageError> {
        Ok(self.lock()?.events.clone())
    }

    async fn load_blocks(&self) -> Result<Vec<(Position, Block)>, StorageError> {
        Ok(self.lock()?.blocks.clone())
    }

    async fn load_features(&self) -> Result<Vec<WorldFeature>, StorageError> {
        Ok(self.lock()?.features.clone())
    }

    async fn load_rule_overrides(
        &self,
    ) -> Result<BTreeMap<String, serde_json::Value>, StorageError> {
        Ok(self.lock()?.rule_overrides.clone())
    }

    async fn save_rule_override(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StorageError> {
        self.lock()?.rule_overrides.insert(key.to_owned(), value);
        Ok(())
    }

    async fn chapter_exists(&self, era_number: u64) -> Result<bool, StorageError> {
        Ok(self.lock()?.chapters.contains_key(&era_number))
    }

    async fn latest_era(&self) -> Result<Option<u64>, StorageError> {
        Ok(self.lock()?.chapters.keys().last().copied())
    }

    async fn save_chapter(&self, chapter: &SagaChapter) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        if inner.chapters.contains_key(&chapter.era_number) {
            return Err(StorageError::DuplicateChapter(chapter.era_number));
        }
        inner.chapters.insert(chapter.era_number, chapter.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn batch(number: u64) -> CycleBatch {
        CycleBatch {
            tick: TickRecord {
                number,
                snapshot: serde_json::Value::Null,
                agent_count: 0,
                concept_count: 0,
                processing_time_ms: 1,
                completed_at: Utc::now(),
            },
            agents: Vec::new(),
            blocks: Vec::new(),
            features: Vec::new(),
            events: Vec::new(),
        }
    }

    #[tokio::test]
    async fn persisted_cycles_accumulate() {
        let repo = MemoryRepository::new();
        repo.persist_cycle(&batch(1)).await.unwrap();
        repo.persist_cycle(&batch(2)).await.unwrap();
        assert_eq!(repo.latest_tick().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn injected_failure_persists_nothing() {
        let repo = MemoryRepository::new();
        repo.fail_persists(true);
        assert!(repo.persist_cycle(&batch(1)).await.is_err());
        assert_eq!(repo.latest_tick().await.unwrap(), None);
    }

    #[tokio::test]
    async fn chapters_are_write_once() {
        let repo = MemoryRepository::new();
        let chapter = SagaChapter {
            era_number: 1,
            start_tick: 1,
            end_tick: 50,
            narrative: String::from("In the beginning."),
            summary: String::from("genesis"),
            statistics: perpetua_types::EraStatistics::default(),
            key_events: Vec::new(),
            key_characters: Vec::new(),
            generation_time_ms: 5,
            created_at: Utc::now(),
        };
        repo.save_chapter(&chapter).await.unwrap();
        let err = repo.save_chapter(&chapter).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateChapter(1)));
        assert!(repo.chapter_exists(1).await.unwrap());
        assert_eq!(repo.latest_era().await.unwrap(), Some(1));
    }
}
