//! The Perpetua engine core: the tick scheduler and everything one cycle
//! touches.
//!
//! A cycle runs wake, the bounded-concurrency decision pipeline, and the
//! deterministic arbitrator against a staged copy of the world, persists
//! the whole result as one batch, and only then commits. The chronicler
//! closes eras as their boundaries pass.
//!
//! # Modules
//!
//! - [`admin`] -- Genesis, world templates, god rule administration, stats.
//! - [`arbiter`] -- Sequential `(sequence, agent_id)` proposal arbitration.
//! - [`chronicler`] -- Era closing and saga chapter generation.
//! - [`config`] -- YAML configuration with env overrides.
//! - [`perception`] -- Per-agent perception assembly.
//! - [`pipeline`] -- Bounded-concurrency oracle calls with fallbacks.
//! - [`scheduler`] -- The serialized tick engine and its run loop.
//! - [`storage`] -- The [`Repository`] seam and the in-memory backend.

pub mod admin;
pub mod arbiter;
pub mod chronicler;
pub mod config;
pub mod perception;
pub mod pipeline;
pub mod scheduler;
pub mod storage;

// Re-export primary types at crate root.
pub use arbiter::{ArbitrationOutcome, ProposalOutcome, arbitrate};
pub use chronicler::Chronicler;
pub use config::{ConfigError, EngineConfig};
pub use perception::build_perception;
pub use pipeline::collect_proposals;
pub use scheduler::{CycleSummary, TickEngine};
pub use storage::{CycleBatch, MemoryRepository, Repository, StorageError};
