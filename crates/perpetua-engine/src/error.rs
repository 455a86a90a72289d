//! Error types for the world engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all failure
//! modes during startup; `main` propagates everything through it with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: perpetua_core::ConfigError,
    },

    /// A repository operation failed.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying storage error.
        #[from]
        source: perpetua_core::StorageError,
    },

    /// Database connection or schema bootstrap failed.
    #[error("database error: {source}")]
    Database {
        /// The underlying database error.
        #[from]
        source: perpetua_db::DbError,
    },

    /// Seeding the genesis world failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: perpetua_world::WorldError,
    },
}
