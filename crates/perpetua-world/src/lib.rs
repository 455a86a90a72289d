//! World state store for the Perpetua simulation.
//!
//! This crate models everything the tick engine mutates: the sparse voxel
//! grid, world features with regeneration, the agent and concept
//! registries, and the god rule registry with its clamping bounds.
//!
//! # Modules
//!
//! - [`agents`] -- Agent registry with one-way death and eligibility scans.
//! - [`concepts`] -- Name-unique concept registry.
//! - [`error`] -- Error types for world-state operations.
//! - [`features`] -- Feature map with stock, claims, and world-wake
//!   regeneration.
//! - [`grid`] -- Sparse voxel grid with idempotent block placement.
//! - [`rules`] -- God rule registry: known keys clamped, custom keys open.
//! - [`state`] -- [`WorldState`] bundling all of the above, plus snapshots.
//! - [`template`] -- Validate-then-commit idempotent world templates.

pub mod agents;
pub mod concepts;
pub mod error;
pub mod features;
pub mod grid;
pub mod rules;
pub mod state;
pub mod template;

// Re-export primary types at crate root.
pub use agents::AgentRegistry;
pub use concepts::ConceptRegistry;
pub use error::WorldError;
pub use features::{FeatureMap, PROP_CAPACITY, PROP_REGEN, PROP_STOCK};
pub use grid::{Placement, VoxelGrid};
pub use rules::{EffectiveRules, GodRuleRegistry, RuleChange};
pub use state::WorldState;
pub use template::{TemplatePlacement, TemplateReport, WorldTemplate, apply_template};
