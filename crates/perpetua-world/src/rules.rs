//! The god rule registry: world-level numeric parameters with safe bounds.
//!
//! Rules come in two flavors. *Known* rules have a built-in default and a
//! clamping range; setting one never fails, out-of-range values are clamped
//! into bounds. *Custom* rules are open extension points: any key is
//! accepted and stored verbatim, carried through snapshots, and surfaced in
//! the effective rule set without clamping.
//!
//! Overrides are stored as raw JSON values so a registry reloaded from
//! persistence tolerates historical junk: values that fail numeric coercion
//! are silently dropped when the effective rules are computed.

use std::collections::BTreeMap;

/// A known rule's default value and clamping bounds.
#[derive(Debug, Clone, Copy)]
pub struct RuleBounds {
    /// Built-in default when no override is stored.
    pub default: f64,
    /// Inclusive lower clamp.
    pub min: f64,
    /// Inclusive upper clamp.
    pub max: f64,
}

impl RuleBounds {
    const fn new(default: f64, min: f64, max: f64) -> Self {
        Self { default, min, max }
    }

    fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Maximum distance from the origin at which blocks may be placed.
pub const MAX_WORLD_RADIUS: &str = "max_world_radius";
/// Maximum per-tick movement distance for agents.
pub const AGENT_MOVE_RANGE: &str = "agent_move_range";
/// Multiplier applied to feature regeneration each tick.
pub const RESOURCE_REGEN_MULTIPLIER: &str = "resource_regen_multiplier";
/// Energy restored by one successful gather action.
pub const GATHER_YIELD: &str = "gather_yield";

/// Bounds for a known rule key, or `None` for custom keys.
pub fn bounds_for(key: &str) -> Option<RuleBounds> {
    match key {
        MAX_WORLD_RADIUS => Some(RuleBounds::new(64.0, 8.0, 512.0)),
        AGENT_MOVE_RANGE => Some(RuleBounds::new(4.0, 1.0, 16.0)),
        RESOURCE_REGEN_MULTIPLIER => Some(RuleBounds::new(1.0, 0.0, 5.0)),
        GATHER_YIELD => Some(RuleBounds::new(10.0, 0.0, 100.0)),
        _ => None,
    }
}

/// Outcome of storing a rule override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleChange {
    /// The value was stored as given.
    Stored(f64),
    /// The value was clamped into the known rule's bounds before storing.
    Clamped {
        /// The value as requested.
        requested: f64,
        /// The value actually stored.
        stored: f64,
    },
    /// The value could not be coerced to a number and was ignored.
    Ignored,
}

impl RuleChange {
    /// The value now in effect for the key, if the change took.
    pub const fn stored_value(self) -> Option<f64> {
        match self {
            Self::Stored(value) | Self::Clamped { stored: value, .. } => Some(value),
            Self::Ignored => None,
        }
    }
}

/// Mutable store of god rule overrides.
#[derive(Debug, Clone, Default)]
pub struct GodRuleRegistry {
    overrides: BTreeMap<String, serde_json::Value>,
}

impl GodRuleRegistry {
    /// Create a registry with no overrides (all known rules at defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from persisted overrides, e.g. on restart.
    pub fn from_overrides(overrides: BTreeMap<String, serde_json::Value>) -> Self {
        Self { overrides }
    }

    /// The raw stored overrides, for persistence.
    pub fn overrides(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.overrides
    }

    /// Store a rule override. Never fails: known keys are clamped into
    /// bounds, unknown keys are stored verbatim, non-numeric values are
    /// ignored.
    pub fn set(&mut self, key: &str, value: serde_json::Value) -> RuleChange {
        let Some(requested) = coerce_f64(&value) else {
            tracing::debug!(rule = key, "ignoring non-numeric rule value");
            return RuleChange::Ignored;
        };

        let change = match bounds_for(key) {
            Some(bounds) => {
                let stored = bounds.clamp(requested);
                if (stored - requested).abs() > f64::EPSILON {
                    tracing::info!(rule = key, requested, stored, "clamped rule override");
                    RuleChange::Clamped { requested, stored }
                } else {
                    RuleChange::Stored(stored)
                }
            }
            None => RuleChange::Stored(requested),
        };

        if let Some(stored) = change.stored_value() {
            self.overrides
                .insert(key.to_owned(), serde_json::json!(stored));
        }
        change
    }

    /// Convenience wrapper for numeric callers.
    pub fn set_f64(&mut self, key: &str, value: f64) -> RuleChange {
        self.set(key, serde_json::json!(value))
    }

    /// Remove an override, reverting a known key to its default.
    pub fn clear(&mut self, key: &str) -> bool {
        self.overrides.remove(key).is_some()
    }

    /// Merge built-in defaults with stored overrides into the effective
    /// rule set. Overrides that fail numeric coercion are dropped; known
    /// keys are re-clamped so stale persisted values cannot escape bounds.
    pub fn effective(&self) -> EffectiveRules {
        let mut values: BTreeMap<String, f64> = BTreeMap::new();
        for key in [
            MAX_WORLD_RADIUS,
            AGENT_MOVE_RANGE,
            RESOURCE_REGEN_MULTIPLIER,
            GATHER_YIELD,
        ] {
            if let Some(bounds) = bounds_for(key) {
                values.insert(key.to_owned(), bounds.default);
            }
        }
        for (key, raw) in &self.overrides {
            let Some(value) = coerce_f64(raw) else {
                tracing::debug!(rule = %key, "dropping non-numeric rule override");
                continue;
            };
            let value = bounds_for(key).map_or(value, |bounds| bounds.clamp(value));
            values.insert(key.clone(), value);
        }
        EffectiveRules { values }
    }
}

fn coerce_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The merged, clamped rule set in effect for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRules {
    values: BTreeMap<String, f64>,
}

impl EffectiveRules {
    /// Value of an arbitrary rule key, with a caller-supplied default.
    pub fn value(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    /// All effective values, for snapshots and the admin surface.
    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    /// Maximum distance from the origin at which blocks may be placed.
    pub fn max_world_radius(&self) -> f64 {
        self.value(MAX_WORLD_RADIUS, 64.0)
    }

    /// Maximum per-tick movement distance for agents.
    pub fn agent_move_range(&self) -> f64 {
        self.value(AGENT_MOVE_RANGE, 4.0)
    }

    /// Multiplier applied to feature regeneration each tick.
    pub fn resource_regen_multiplier(&self) -> f64 {
        self.value(RESOURCE_REGEN_MULTIPLIER, 1.0)
    }

    /// Energy restored by one successful gather action.
    pub fn gather_yield(&self) -> f64 {
        self.value(GATHER_YIELD, 10.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_overrides() {
        let rules = GodRuleRegistry::new().effective();
        assert!((rules.max_world_radius() - 64.0).abs() < f64::EPSILON);
        assert!((rules.agent_move_range() - 4.0).abs() < f64::EPSILON);
        assert!((rules.resource_regen_multiplier() - 1.0).abs() < f64::EPSILON);
        assert!((rules.gather_yield() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn known_rule_clamps_out_of_range_value() {
        let mut registry = GodRuleRegistry::new();
        let change = registry.set_f64(RESOURCE_REGEN_MULTIPLIER, 10.0);
        assert_eq!(change.stored_value(), Some(5.0));
        let rules = registry.effective();
        assert!((rules.resource_regen_multiplier() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn custom_rule_stores_verbatim() {
        let mut registry = GodRuleRegistry::new();
        let change = registry.set_f64("custom_rule", 2.5);
        assert_eq!(change.stored_value(), Some(2.5));
        let rules = registry.effective();
        assert!((rules.value("custom_rule", 0.0) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn string_values_are_coerced() {
        let mut registry = GodRuleRegistry::new();
        let change = registry.set(GATHER_YIELD, serde_json::json!("25"));
        assert_eq!(change.stored_value(), Some(25.0));
    }

    #[test]
    fn non_numeric_value_is_ignored() {
        let mut registry = GodRuleRegistry::new();
        let change = registry.set(GATHER_YIELD, serde_json::json!({"nope": true}));
        assert_eq!(change, RuleChange::Ignored);
        let rules = registry.effective();
        assert!((rules.gather_yield() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reloaded_junk_overrides_are_dropped_at_merge() {
        let overrides = BTreeMap::from([
            (String::from(AGENT_MOVE_RANGE), serde_json::json!(200.0)),
            (String::from("legacy_flag"), serde_json::json!(true)),
        ]);
        let rules = GodRuleRegistry::from_overrides(overrides).effective();
        // Stale persisted value is re-clamped, junk is dropped.
        assert!((rules.agent_move_range() - 16.0).abs() < f64::EPSILON);
        assert!(!rules.values().contains_key("legacy_flag"));
    }

    #[test]
    fn clear_reverts_to_default() {
        let mut registry = GodRuleRegistry::new();
        registry.set_f64(GATHER_YIELD, 50.0);
        assert!(registry.clear(GATHER_YIELD));
        let rules = registry.effective();
        assert!((rules.gather_yield() - 10.0).abs() < f64::EPSILON);
    }
}
