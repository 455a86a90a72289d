//! Append-only event log for the Perpetua simulation.
//!
//! Every world-significant occurrence produces an immutable [`Event`]
//! ordered by `(tick, sequence)`. The log is the chronicler's source of
//! truth: saga chapters are generated from event ranges, and subscribers
//! receive best-effort notifications outside the tick's critical path.
//!
//! # Modules
//!
//! - [`log`] -- The [`EventLog`]: seal/commit recording, ordered queries.
//! - [`subscribe`] -- The [`EventSubscriber`] trait for best-effort
//!   fan-out.
//!
//! [`Event`]: perpetua_types::Event

pub mod log;
pub mod subscribe;

// Re-export primary types at crate root.
pub use log::EventLog;
pub use subscribe::{EventSubscriber, NotifyError};
