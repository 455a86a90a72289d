//! The concept registry: ideas coined by agents through the oracle.
//!
//! Concept names are globally unique. Coining an already-registered name is
//! a silent no-op so duplicate proposals across agents in the same tick
//! cannot fail the batch.

use std::collections::BTreeMap;

use perpetua_types::Concept;

/// Registry of coined concepts keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ConceptRegistry {
    concepts: BTreeMap<String, Concept>,
}

impl ConceptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered concepts.
    pub fn count(&self) -> usize {
        self.concepts.len()
    }

    /// Whether a concept name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.concepts.contains_key(name)
    }

    /// The concept with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    /// Register a concept. Returns `true` if the name was new, `false` if
    /// it was already registered (the original is kept).
    pub fn register(&mut self, concept: Concept) -> bool {
        if self.concepts.contains_key(&concept.name) {
            return false;
        }
        tracing::info!(concept = %concept.name, coined_by = %concept.coined_by, "concept coined");
        self.concepts.insert(concept.name.clone(), concept);
        true
    }

    /// Iterate all concepts in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }
}
