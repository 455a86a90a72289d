//! World features: named zones with radii, stock, and regeneration.
//!
//! Resource features carry `stock`, `regen`, and `capacity` properties.
//! Regeneration runs during the world-wake phase of the tick cycle, scaled
//! by the `resource_regen_multiplier` god rule and capped so stock never
//! exceeds capacity. Gathering draws stock down and is partial when the
//! feature is nearly depleted.

use std::collections::BTreeMap;

use perpetua_types::{AgentId, FeatureId, FeatureKind, Position, WorldFeature};

use crate::error::WorldError;

/// Property key for the current gatherable stock of a resource feature.
pub const PROP_STOCK: &str = "stock";
/// Property key for the per-tick base regeneration rate.
pub const PROP_REGEN: &str = "regen";
/// Property key for the stock ceiling.
pub const PROP_CAPACITY: &str = "capacity";

/// Registry of world features keyed by [`FeatureId`].
#[derive(Debug, Clone, Default)]
pub struct FeatureMap {
    features: BTreeMap<FeatureId, WorldFeature>,
}

impl FeatureMap {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of features, active or not.
    pub fn count(&self) -> usize {
        self.features.len()
    }

    /// The feature with the given id, if any.
    pub fn get(&self, id: FeatureId) -> Option<&WorldFeature> {
        self.features.get(&id)
    }

    /// Insert a new feature.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::DuplicateFeature`] if the id already exists.
    pub fn insert(&mut self, feature: WorldFeature) -> Result<(), WorldError> {
        if self.features.contains_key(&feature.id) {
            return Err(WorldError::DuplicateFeature(feature.id));
        }
        self.features.insert(feature.id, feature);
        Ok(())
    }

    /// Active features whose center lies within a radius of a point,
    /// in id order.
    pub fn active_within(&self, center: Position, radius: f64) -> Vec<&WorldFeature> {
        self.features
            .values()
            .filter(|f| f.is_active && center.distance(f.position) <= radius)
            .collect()
    }

    /// Iterate all features in id order.
    pub fn iter(&self) -> impl Iterator<Item = &WorldFeature> {
        self.features.values()
    }

    /// Claim a feature exclusively for an agent.
    ///
    /// Re-claiming a feature the agent already owns is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::FeatureNotFound`] for unknown ids and
    /// [`WorldError::FeatureClaimed`] when another agent holds the claim.
    pub fn claim(&mut self, id: FeatureId, agent: AgentId) -> Result<(), WorldError> {
        let feature = self
            .features
            .get_mut(&id)
            .ok_or(WorldError::FeatureNotFound(id))?;
        match feature.claimed_by {
            Some(owner) if owner != agent => Err(WorldError::FeatureClaimed {
                feature: id,
                owner,
            }),
            _ => {
                feature.claimed_by = Some(agent);
                Ok(())
            }
        }
    }

    /// Draw stock from a resource feature, returning the amount actually
    /// taken (partial when the feature is nearly depleted).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::FeatureNotFound`] for unknown ids.
    pub fn gather(&mut self, id: FeatureId, requested: f64) -> Result<f64, WorldError> {
        let feature = self
            .features
            .get_mut(&id)
            .ok_or(WorldError::FeatureNotFound(id))?;
        let stock = feature.property(PROP_STOCK, 0.0);
        let taken = requested.clamp(0.0, stock);
        feature
            .properties
            .insert(PROP_STOCK.to_owned(), stock - taken);
        Ok(taken)
    }

    /// Apply one world-wake regeneration pass to every active resource
    /// feature. Returns the total stock regained across the map.
    pub fn regenerate(&mut self, multiplier: f64) -> f64 {
        let mut regained = 0.0;
        for feature in self.features.values_mut() {
            if !feature.is_active || feature.kind != FeatureKind::Resource {
                continue;
            }
            let stock = feature.property(PROP_STOCK, 0.0);
            let regen = feature.property(PROP_REGEN, 0.0);
            let capacity = feature.property(PROP_CAPACITY, stock);
            let added = (regen * multiplier).clamp(0.0, (capacity - stock).max(0.0));
            if added > 0.0 {
                feature
                    .properties
                    .insert(PROP_STOCK.to_owned(), stock + added);
                regained += added;
            }
        }
        regained
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn resource(stock: f64, regen: f64, capacity: f64) -> WorldFeature {
        WorldFeature {
            id: FeatureId::new(),
            kind: FeatureKind::Resource,
            position: Position::new(0, 0),
            radius: 3.0,
            properties: BTreeMap::from([
                (String::from(PROP_STOCK), stock),
                (String::from(PROP_REGEN), regen),
                (String::from(PROP_CAPACITY), capacity),
            ]),
            claimed_by: None,
            is_active: true,
        }
    }

    #[test]
    fn regeneration_respects_multiplier_and_capacity() {
        let mut map = FeatureMap::new();
        let feature = resource(95.0, 4.0, 100.0);
        let id = feature.id;
        map.insert(feature).unwrap();
        // 4 * 2 = 8 regen, but only 5 of headroom remain.
        let regained = map.regenerate(2.0);
        assert!((regained - 5.0).abs() < f64::EPSILON);
        assert!((map.get(id).unwrap().property(PROP_STOCK, 0.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_multiplier_freezes_regeneration() {
        let mut map = FeatureMap::new();
        map.insert(resource(10.0, 4.0, 100.0)).unwrap();
        assert!(map.regenerate(0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn inactive_features_do_not_regenerate() {
        let mut map = FeatureMap::new();
        let mut feature = resource(10.0, 4.0, 100.0);
        feature.is_active = false;
        map.insert(feature).unwrap();
        assert!(map.regenerate(1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gather_is_partial_when_depleted() {
        let mut map = FeatureMap::new();
        let feature = resource(3.0, 1.0, 100.0);
        let id = feature.id;
        map.insert(feature).unwrap();
        let taken = map.gather(id, 10.0).unwrap();
        assert!((taken - 3.0).abs() < f64::EPSILON);
        assert!(map.get(id).unwrap().property(PROP_STOCK, 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn claim_is_exclusive_but_reentrant() {
        let mut map = FeatureMap::new();
        let feature = resource(10.0, 1.0, 100.0);
        let id = feature.id;
        map.insert(feature).unwrap();

        let first = AgentId::new();
        let second = AgentId::new();
        map.claim(id, first).unwrap();
        map.claim(id, first).unwrap();
        let err = map.claim(id, second).unwrap_err();
        assert!(matches!(err, WorldError::FeatureClaimed { .. }));
    }

    #[test]
    fn active_within_excludes_inactive_and_distant() {
        let mut map = FeatureMap::new();
        map.insert(resource(1.0, 0.0, 1.0)).unwrap();
        let mut far = resource(1.0, 0.0, 1.0);
        far.position = Position::new(50, 50);
        map.insert(far).unwrap();
        let mut off = resource(1.0, 0.0, 1.0);
        off.is_active = false;
        map.insert(off).unwrap();

        assert_eq!(map.active_within(Position::new(0, 0), 10.0).len(), 1);
    }
}
