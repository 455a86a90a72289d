//! Configuration loading and typed config structures for the engine.
//!
//! The canonical configuration lives in `perpetua.yaml` at the project
//! root. This module defines strongly-typed structs mirroring the YAML
//! structure, with per-field defaults so a partial file (or no file at
//! all) yields a runnable configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// World parameters.
    #[serde(default)]
    pub world: WorldConfig,

    /// Decision pipeline parameters.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Oracle backend settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure:
    /// - `DATABASE_URL` overrides `database.url`
    /// - `ORACLE_API_URL` overrides `oracle.api_url`
    /// - `ORACLE_API_KEY` overrides `oracle.api_key`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.is_empty()
        {
            self.database.url = url;
        }
        if let Ok(url) = std::env::var("ORACLE_API_URL")
            && !url.is_empty()
        {
            self.oracle.api_url = url;
        }
        if let Ok(key) = std::env::var("ORACLE_API_KEY")
            && !key.is_empty()
        {
            self.oracle.api_key = key;
        }
    }
}

/// World-level parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Milliseconds between tick intervals.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Minimum ticks between decision rounds for one agent.
    #[serde(default = "default_think_interval_ticks")]
    pub think_interval_ticks: u64,
    /// Perception radius in grid units.
    #[serde(default = "default_perception_radius")]
    pub perception_radius: f64,
    /// Newest memory fragments included in a perception.
    #[serde(default = "default_memory_excerpt_len")]
    pub memory_excerpt_len: usize,
    /// Minimum importance for an event to be recorded.
    #[serde(default = "default_event_importance_threshold")]
    pub event_importance_threshold: u8,
    /// Ticks per era.
    #[serde(default = "default_era_length_ticks")]
    pub era_length_ticks: u64,
    /// Agents spawned at genesis.
    #[serde(default = "default_genesis_agents")]
    pub genesis_agents: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            think_interval_ticks: default_think_interval_ticks(),
            perception_radius: default_perception_radius(),
            memory_excerpt_len: default_memory_excerpt_len(),
            event_importance_threshold: default_event_importance_threshold(),
            era_length_ticks: default_era_length_ticks(),
            genesis_agents: default_genesis_agents(),
        }
    }
}

/// Decision pipeline parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent oracle calls in flight.
    #[serde(default = "default_oracle_concurrency")]
    pub oracle_concurrency: usize,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_oracle_call_timeout_ms")]
    pub oracle_call_timeout_ms: u64,
    /// Deadline for the whole pipeline in milliseconds.
    #[serde(default = "default_pipeline_deadline_ms")]
    pub pipeline_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            oracle_concurrency: default_oracle_concurrency(),
            oracle_call_timeout_ms: default_oracle_call_timeout_ms(),
            pipeline_deadline_ms: default_pipeline_deadline_ms(),
        }
    }
}

/// Oracle backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OracleConfig {
    /// Whether a paid backend is configured; `false` runs the observe
    /// stub.
    #[serde(default)]
    pub enabled: bool,
    /// Backend flavor: `open_ai` or `anthropic`.
    #[serde(default = "default_oracle_kind")]
    pub kind: String,
    /// Base API URL.
    #[serde(default = "default_oracle_api_url")]
    pub api_url: String,
    /// API key (normally from `ORACLE_API_KEY`).
    #[serde(default)]
    pub api_key: String,
    /// Model identifier.
    #[serde(default = "default_oracle_model")]
    pub model: String,
    /// Dollars per million input tokens.
    #[serde(default = "default_input_rate")]
    pub input_rate_per_million: rust_decimal::Decimal,
    /// Dollars per million output tokens.
    #[serde(default = "default_output_rate")]
    pub output_rate_per_million: rust_decimal::Decimal,
    /// Daily spend limit in dollars.
    #[serde(default = "default_daily_budget")]
    pub daily_budget_usd: rust_decimal::Decimal,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: default_oracle_kind(),
            api_url: default_oracle_api_url(),
            api_key: String::new(),
            model: default_oracle_model(),
            input_rate_per_million: default_input_rate(),
            output_rate_per_million: default_output_rate(),
            daily_budget_usd: default_daily_budget(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string; empty means run in-memory only.
    #[serde(default)]
    pub url: String,
    /// Connection pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

/// Event notification settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotifyConfig {
    /// URL that committed events are POSTed to, e.g. a discussion-board
    /// collaborator. Empty disables the webhook.
    #[serde(default)]
    pub webhook_url: String,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive, e.g. `info,perpetua_core=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    60_000
}
const fn default_think_interval_ticks() -> u64 {
    1
}
const fn default_perception_radius() -> f64 {
    10.0
}
const fn default_memory_excerpt_len() -> usize {
    8
}
const fn default_event_importance_threshold() -> u8 {
    3
}
const fn default_era_length_ticks() -> u64 {
    50
}
const fn default_genesis_agents() -> u32 {
    4
}
const fn default_oracle_concurrency() -> usize {
    4
}
const fn default_oracle_call_timeout_ms() -> u64 {
    30_000
}
const fn default_pipeline_deadline_ms() -> u64 {
    120_000
}
fn default_oracle_kind() -> String {
    String::from("open_ai")
}
fn default_oracle_api_url() -> String {
    String::from("https://api.openai.com/v1")
}
fn default_oracle_model() -> String {
    String::from("gpt-4o-mini")
}
fn default_input_rate() -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(15, 2) // $0.15 per 1M input
}
fn default_output_rate() -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(60, 2) // $0.60 per 1M output
}
fn default_daily_budget() -> rust_decimal::Decimal {
    rust_decimal::Decimal::new(500, 2) // $5.00 per day
}
const fn default_max_connections() -> u32 {
    5
}
fn default_log_filter() -> String {
    String::from("info")
}
