//! Enumeration types shared across the simulation.

use serde::{Deserialize, Serialize};

/// Kinds of world features.
///
/// A feature is a named zone influencing nearby agent outcomes,
/// independent of voxel occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// A gatherable resource node (berries, ore, water).
    Resource,
    /// A shelter zone protecting agents inside its radius.
    Shelter,
    /// A workshop zone enabling crafting-style interactions.
    Workshop,
    /// Passive terrain (cliffs, rivers) shaping movement.
    Terrain,
}

/// Types of events recorded in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The one-time world creation event.
    Genesis,
    /// An agent entered the world.
    AgentSpawned,
    /// An agent died (one-way transition).
    AgentDied,
    /// A block was placed or removed, or a feature was altered.
    WorldMutation,
    /// An agent claimed ownership of a feature.
    FeatureClaimed,
    /// An agent coined a new concept.
    ConceptCreated,
    /// A proposal was rejected by the arbitrator.
    ActionRejected,
    /// A god rule value changed.
    RuleChanged,
    /// An era closed and its saga chapter was written.
    EraClosed,
}

impl EventType {
    /// Stable string form used for persistence and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Genesis => "genesis",
            Self::AgentSpawned => "agent_spawned",
            Self::AgentDied => "agent_died",
            Self::WorldMutation => "world_mutation",
            Self::FeatureClaimed => "feature_claimed",
            Self::ConceptCreated => "concept_created",
            Self::ActionRejected => "action_rejected",
            Self::RuleChanged => "rule_changed",
            Self::EraClosed => "era_closed",
        }
    }
}

/// Why the arbitrator rejected a proposal.
///
/// Rejections are structured outcomes, not errors: they are recorded in the
/// audit trail and (when significant) the event log, and never abort the
/// batch they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Another, earlier-ordered proposal already claimed the same
    /// exclusive target this tick, or the target is already occupied.
    Conflict,
    /// The proposal failed a validity check (dead agent, missing target).
    Invalid,
    /// The proposal violates a movement or placement bound derived from
    /// the effective god rules.
    OutOfBounds,
    /// Applying the proposal failed with an internal error; the failure is
    /// isolated to this proposal.
    Error,
}

impl RejectionReason {
    /// Stable string form used for persistence and log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::OutOfBounds => "out_of_bounds",
            Self::Error => "error",
        }
    }
}

/// Where a proposal's decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSource {
    /// The decision oracle produced this action.
    Oracle,
    /// The oracle call timed out.
    TimeoutFallback,
    /// The oracle call failed or returned a malformed payload.
    ErrorFallback,
    /// The daily oracle budget was exhausted before this agent's turn.
    BudgetFallback,
}

impl ProposalSource {
    /// Stable string form used for log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::TimeoutFallback => "timeout_fallback",
            Self::ErrorFallback => "error_fallback",
            Self::BudgetFallback => "budget_fallback",
        }
    }

    /// Whether this proposal came from the fallback path rather than a
    /// real oracle decision.
    pub const fn is_fallback(self) -> bool {
        !matches!(self, Self::Oracle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&EventType::WorldMutation).unwrap_or_default();
        assert_eq!(json, "\"world_mutation\"");
    }

    #[test]
    fn rejection_reason_str_matches_serde() {
        for reason in [
            RejectionReason::Conflict,
            RejectionReason::Invalid,
            RejectionReason::OutOfBounds,
            RejectionReason::Error,
        ] {
            let json = serde_json::to_string(&reason).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn only_oracle_source_is_not_fallback() {
        assert!(!ProposalSource::Oracle.is_fallback());
        assert!(ProposalSource::TimeoutFallback.is_fallback());
        assert!(ProposalSource::ErrorFallback.is_fallback());
        assert!(ProposalSource::BudgetFallback.is_fallback());
    }
}
