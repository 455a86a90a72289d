//! Error types for the `perpetua-oracle` crate.

/// Errors raised at the oracle boundary.
///
/// Every variant maps to the observe fallback in the decision pipeline;
/// none of them can fail a tick.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// The HTTP call to the backend failed or returned a non-success
    /// status.
    #[error("oracle backend error: {0}")]
    Backend(String),

    /// The backend's reply could not be parsed into a decision.
    #[error("oracle reply parse error: {0}")]
    Parse(String),
}
