//! `PostgreSQL` persistence for the Perpetua simulation.
//!
//! The engine is authoritative in memory; this crate is the write-behind
//! store it persists each cycle to and recovers from on restart.
//!
//! # Modules
//!
//! - [`error`] -- [`DbError`] and its mapping into the engine's storage
//!   error.
//! - [`postgres`] -- Connection pool and idempotent schema bootstrap.
//! - [`repository`] -- [`PgRepository`], the engine's `Repository` backed
//!   by one transaction per cycle.

pub mod error;
pub mod postgres;
pub mod repository;

pub use error::DbError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use repository::PgRepository;
