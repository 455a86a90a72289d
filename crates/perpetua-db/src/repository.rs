//! The [`Repository`] implementation backed by `PostgreSQL`.
//!
//! One cycle is one transaction: the tick row, the replaced world tables,
//! and the tick's events commit together or not at all. The statements
//! are written to make a retried tick idempotent -- the tick row upserts
//! and events conflict-skip on `(tick, sequence)` -- so a commit whose
//! acknowledgement was lost does not wedge the engine.

use std::collections::BTreeMap;

use sqlx::Row;

use perpetua_core::{CycleBatch, Repository, StorageError};
use perpetua_types::{Agent, Block, Event, Position, SagaChapter, WorldFeature};

use crate::error::DbError;
use crate::postgres::PostgresPool;

/// `PostgreSQL`-backed repository for the tick engine.
#[derive(Clone)]
pub struct PgRepository {
    pool: PostgresPool,
}

impl PgRepository {
    /// Wrap a connected pool.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    async fn persist_cycle_inner(&self, batch: &CycleBatch) -> Result<(), DbError> {
        let mut tx = self.pool.pool().begin().await?;

        sqlx::query(
            r"INSERT INTO ticks (number, snapshot, agent_count, concept_count, processing_time_ms, completed_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (number) DO UPDATE SET
                snapshot = EXCLUDED.snapshot,
                agent_count = EXCLUDED.agent_count,
                concept_count = EXCLUDED.concept_count,
                processing_time_ms = EXCLUDED.processing_time_ms,
                completed_at = EXCLUDED.completed_at",
        )
        .bind(i64::try_from(batch.tick.number).unwrap_or(i64::MAX))
        .bind(&batch.tick.snapshot)
        .bind(i32::try_from(batch.tick.agent_count).unwrap_or(i32::MAX))
        .bind(i32::try_from(batch.tick.concept_count).unwrap_or(i32::MAX))
        .bind(i64::try_from(batch.tick.processing_time_ms).unwrap_or(i64::MAX))
        .bind(batch.tick.completed_at)
        .execute(&mut *tx)
        .await?;

        // Full replacement of the world tables, mirroring the in-memory
        // authoritative state.
        sqlx::query("DELETE FROM agents").execute(&mut *tx).await?;
        if !batch.agents.is_empty() {
            let len = batch.agents.len();
            let mut ids = Vec::with_capacity(len);
            let mut docs = Vec::with_capacity(len);
            for agent in &batch.agents {
                ids.push(agent.id.into_inner());
                docs.push(serde_json::to_value(agent)?);
            }
            sqlx::query(
                r"INSERT INTO agents (id, data)
                  SELECT * FROM UNNEST($1::UUID[], $2::JSONB[])",
            )
            .bind(&ids)
            .bind(&docs)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM blocks").execute(&mut *tx).await?;
        if !batch.blocks.is_empty() {
            let len = batch.blocks.len();
            let mut xs = Vec::with_capacity(len);
            let mut ys = Vec::with_capacity(len);
            let mut docs = Vec::with_capacity(len);
            for (position, block) in &batch.blocks {
                xs.push(position.x);
                ys.push(position.y);
                docs.push(serde_json::to_value(block)?);
            }
            sqlx::query(
                r"INSERT INTO blocks (x, y, data)
                  SELECT * FROM UNNEST($1::INT[], $2::INT[], $3::JSONB[])",
            )
            .bind(&xs)
            .bind(&ys)
            .bind(&docs)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM features")
            .execute(&mut *tx)
            .await?;
        if !batch.features.is_empty() {
            let len = batch.features.len();
            let mut ids = Vec::with_capacity(len);
            let mut docs = Vec::with_capacity(len);
            for feature in &batch.features {
                ids.push(feature.id.into_inner());
                docs.push(serde_json::to_value(feature)?);
            }
            sqlx::query(
                r"INSERT INTO features (id, data)
                  SELECT * FROM UNNEST($1::UUID[], $2::JSONB[])",
            )
            .bind(&ids)
            .bind(&docs)
            .execute(&mut *tx)
            .await?;
        }

        if !batch.events.is_empty() {
            let len = batch.events.len();
            let mut ids = Vec::with_capacity(len);
            let mut ticks = Vec::with_capacity(len);
            let mut sequences = Vec::with_capacity(len);
            let mut importances = Vec::with_capacity(len);
            let mut docs = Vec::with_capacity(len);
            for event in &batch.events {
                ids.push(event.id.into_inner());
                ticks.push(i64::try_from(event.tick).unwrap_or(i64::MAX));
                sequences.push(i32::try_from(event.sequence).unwrap_or(i32::MAX));
                importances.push(i16::from(event.importance));
                docs.push(serde_json::to_value(event)?);
            }
            // A retried tick re-seals the same (tick, sequence) slots with
            // fresh ids; conflict-skip keeps the first committed copy.
            sqlx::query(
                r"INSERT INTO events (id, tick, sequence, importance, data)
                  SELECT * FROM UNNEST($1::UUID[], $2::BIGINT[], $3::INT[], $4::SMALLINT[], $5::JSONB[])
                  ON CONFLICT (tick, sequence) DO NOTHING",
            )
            .bind(&ids)
            .bind(&ticks)
            .bind(&sequences)
            .bind(&importances)
            .bind(&docs)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            tick = batch.tick.number,
            events = batch.events.len(),
            "cycle persisted"
        );
        Ok(())
    }

    async fn load_documents<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
    ) -> Result<Vec<T>, DbError> {
        let rows = sqlx::query(query).fetch_all(self.pool.pool()).await?;
        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let data: serde_json::Value = row.try_get("data")?;
            documents.push(serde_json::from_value(data)?);
        }
        Ok(documents)
    }
}

impl Repository for PgRepository {
    async fn persist_cycle(&self, batch: &CycleBatch) -> Result<(), StorageError> {
        self.persist_cycle_inner(batch).await.map_err(Into::into)
    }

    async fn latest_tick(&self) -> Result<Option<u64>, StorageError> {
        let row = sqlx::query("SELECT MAX(number) AS number FROM ticks")
            .fetch_one(self.pool.pool())
            .await
            .map_err(DbError::from)?;
        let number: Option<i64> = row.try_get("number").map_err(DbError::from)?;
        Ok(number.map(|n| u64::try_from(n).unwrap_or(0)))
    }

    async fn load_agents(&self) -> Result<Vec<Agent>, StorageError> {
        self.load_documents("SELECT data FROM agents ORDER BY id")
            .await
            .map_err(Into::into)
    }

    async fn load_events(&self) -> Result<Vec<Event>, StorageError> {
        self.load_documents("SELECT data FROM events ORDER BY tick, sequence")
            .await
            .map_err(Into::into)
    }

    async fn load_blocks(&self) -> Result<Vec<(Position, Block)>, StorageError> {
        let rows = sqlx::query("SELECT x, y, data FROM blocks ORDER BY x, y")
            .fetch_all(self.pool.pool())
            .await
            .map_err(DbError::from)?;
        let mut blocks = Vec::with_capacity(rows.len());
        for row in rows {
            let x: i32 = row.try_get("x").map_err(DbError::from)?;
            let y: i32 = row.try_get("y").map_err(DbError::from)?;
            let data: serde_json::Value = row.try_get("data").map_err(DbError::from)?;
            let block: Block = serde_json::from_value(data).map_err(DbError::from)?;
            blocks.push((Position::new(x, y), block));
        }
        Ok(blocks)
    }

    async fn load_features(&self) -> Result<Vec<WorldFeature>, StorageError> {
        self.load_documents("SELECT data FROM features ORDER BY id")
            .await
            .map_err(Into::into)
    }

    async fn load_rule_overrides(
        &self,
    ) -> Result<BTreeMap<String, serde_json::Value>, StorageError> {
        let rows = sqlx::query("SELECT key, value FROM rule_overrides")
            .fetch_all(self.pool.pool())
            .await
            .map_err(DbError::from)?;
        let mut overrides = BTreeMap::new();
        for row in rows {
            let key: String = row.try_get("key").map_err(DbError::from)?;
            let value: serde_json::Value = row.try_get("value").map_err(DbError::from)?;
            overrides.insert(key, value);
        }
        Ok(overrides)
    }

    async fn save_rule_override(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"INSERT INTO rule_overrides (key, value) VALUES ($1, $2)
              ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool.pool())
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn chapter_exists(&self, era_number: u64) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM saga_chapters WHERE era_number = $1) AS present")
            .bind(i64::try_from(era_number).unwrap_or(i64::MAX))
            .fetch_one(self.pool.pool())
            .await
            .map_err(DbError::from)?;
        let present: bool = row.try_get("present").map_err(DbError::from)?;
        Ok(present)
    }

    async fn latest_era(&self) -> Result<Option<u64>, StorageError> {
        let row = sqlx::query("SELECT MAX(era_number) AS era FROM saga_chapters")
            .fetch_one(self.pool.pool())
            .await
            .map_err(DbError::from)?;
        let era: Option<i64> = row.try_get("era").map_err(DbError::from)?;
        Ok(era.map(|n| u64::try_from(n).unwrap_or(0)))
    }

    async fn save_chapter(&self, chapter: &SagaChapter) -> Result<(), StorageError> {
        let data = serde_json::to_value(chapter).map_err(DbError::from)?;
        let result = sqlx::query(
            r"INSERT INTO saga_chapters (era_number, data) VALUES ($1, $2)
              ON CONFLICT (era_number) DO NOTHING",
        )
        .bind(i64::try_from(chapter.era_number).unwrap_or(i64::MAX))
        .bind(data)
        .execute(self.pool.pool())
        .await
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::DuplicateChapter(chapter.era_number));
        }
        Ok(())
    }
}
