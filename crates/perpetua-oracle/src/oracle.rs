//! The [`Oracle`] trait: the engine's only view of the decision backend.
//!
//! The trait has two surfaces: per-agent decisions during the tick cycle,
//! and free-form narration used by the saga chronicler. Implementations
//! must be cheap to share across the bounded-concurrency pipeline, so all
//! methods take `&self`.

use rust_decimal::Decimal;

use perpetua_types::{ConceptProposal, Perception, ProposedAction};

use crate::error::OracleError;

/// A fully parsed decision for one agent, one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// The action the oracle chose.
    pub action: ProposedAction,
    /// A memory fragment to append to the agent, if any.
    pub new_memory: Option<String>,
    /// A concept the oracle wants to coin, if any.
    pub concept: Option<ConceptProposal>,
    /// The oracle's reasoning, logged but never acted on.
    pub reasoning: Option<String>,
    /// Estimated dollar cost of producing this decision.
    pub cost: Decimal,
}

impl Decision {
    /// A zero-cost observe decision.
    pub const fn observe() -> Self {
        Self {
            action: ProposedAction::Observe,
            new_memory: None,
            concept: None,
            reasoning: None,
            cost: Decimal::ZERO,
        }
    }
}

/// The decision backend driving agent behavior.
///
/// Uses return-position `impl Future` with an explicit `Send` bound so the
/// engine can stay generic without boxing.
pub trait Oracle: Send + Sync {
    /// Decide one agent's action from its perception.
    fn decide(
        &self,
        perception: &Perception,
    ) -> impl Future<Output = Result<Decision, OracleError>> + Send;

    /// Generate free-form narrative text from a prompt. Returns the text
    /// and its estimated dollar cost.
    fn narrate(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<(String, Decimal), OracleError>> + Send;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// The null oracle: every agent observes, narration is a stock line.
///
/// Used when no backend is configured, and as the baseline in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOracle;

impl Oracle for ObserveOracle {
    async fn decide(&self, _perception: &Perception) -> Result<Decision, OracleError> {
        Ok(Decision::observe())
    }

    async fn narrate(&self, _prompt: &str) -> Result<(String, Decimal), OracleError> {
        Ok((
            String::from("The world turned, and nothing asked it why."),
            Decimal::ZERO,
        ))
    }

    fn name(&self) -> &'static str {
        "observe"
    }
}
