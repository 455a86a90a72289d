//! Decision oracle boundary for the Perpetua simulation.
//!
//! The oracle is the external brain behind every agent: the engine sends a
//! perception, the oracle returns a typed action plus optional memory and
//! concept payloads. This crate defines the [`Oracle`] trait, the HTTP
//! backends behind it, reply parsing with recovery strategies, and the
//! daily spend budget.
//!
//! # Modules
//!
//! - [`budget`] -- Daily spend accumulator with UTC date rollover.
//! - [`client`] -- HTTP backends (OpenAI-compatible, Anthropic).
//! - [`error`] -- Error types for the oracle boundary.
//! - [`http`] -- The HTTP-backed [`Oracle`] with per-token pricing.
//! - [`oracle`] -- The [`Oracle`] trait and the null [`ObserveOracle`].
//! - [`parse`] -- Reply parsing with multi-strategy JSON recovery.
//! - [`prompt`] -- Prompt construction for decisions.
//! - [`scripted`] -- Deterministic scripted oracle for tests.

pub mod budget;
pub mod client;
pub mod error;
pub mod http;
pub mod oracle;
pub mod parse;
pub mod prompt;
pub mod scripted;

// Re-export primary types at crate root.
pub use budget::{BudgetSummary, DailyBudget};
pub use client::{BackendConfig, BackendKind, Completion, OracleBackend};
pub use error::OracleError;
pub use http::{HttpOracle, Pricing};
pub use oracle::{Decision, ObserveOracle, Oracle};
pub use parse::{ParsedReply, parse_reply};
pub use scripted::{Behavior, ScriptedOracle};
