//! Administrative operations: genesis, world templates, god rules, and
//! stats queries.
//!
//! These run between cycles against the authoritative world. Each returns
//! the event drafts it produced; callers queue them on the engine so they
//! are sealed and persisted with the next tick.

use perpetua_events::EventLog;
use perpetua_types::{Agent, EventDraft, EventType, WorldFeature};
use perpetua_world::{RuleChange, TemplateReport, WorldError, WorldState, WorldTemplate, rules};

use crate::storage::{Repository, StorageError};

/// Seed an empty world with its first agents and features.
///
/// One-shot and idempotent: a world that already has agents is left
/// untouched and no drafts are produced.
///
/// # Errors
///
/// Returns [`WorldError`] when a seeded agent or feature collides, which
/// only happens with duplicate ids in the seed itself.
pub fn genesis(
    world: &mut WorldState,
    agents: Vec<Agent>,
    features: Vec<WorldFeature>,
) -> Result<Vec<EventDraft>, WorldError> {
    if world.agents.total_count() > 0 {
        tracing::info!("genesis skipped, world is already populated");
        return Ok(Vec::new());
    }

    let mut drafts = vec![EventDraft::new(
        EventType::Genesis,
        10,
        "The world began",
        format!("The world began with {} agents", agents.len()),
    )];

    for agent in agents {
        let draft = EventDraft::new(
            EventType::AgentSpawned,
            6,
            format!("{} entered the world", agent.name),
            format!("{} entered the world at {}", agent.name, agent.position),
        )
        .with_agent(agent.id);
        world.agents.insert(agent)?;
        drafts.push(draft);
    }
    for feature in features {
        world.features.insert(feature)?;
    }

    tracing::info!(
        agents = world.agents.total_count(),
        features = world.features.count(),
        "genesis complete"
    );
    Ok(drafts)
}

/// Apply a named world template to the grid.
///
/// Safe to re-run: cells the template already filled are skipped, so the
/// second application places nothing.
///
/// # Errors
///
/// Returns [`WorldError::OutOfWorld`] when any placement falls outside the
/// current world radius; nothing is placed in that case.
pub fn apply_world_template(
    world: &mut WorldState,
    template: &WorldTemplate,
    tick: u64,
) -> Result<(TemplateReport, Option<EventDraft>), WorldError> {
    let world_radius = world.rules.effective().max_world_radius();
    let report = perpetua_world::apply_template(&mut world.grid, template, tick, world_radius)?;

    let draft = (report.placed > 0).then(|| {
        EventDraft::new(
            EventType::WorldMutation,
            5,
            format!("Template {} applied", template.name),
            format!(
                "Template {} placed {} blocks ({} cells already filled)",
                template.name, report.placed, report.skipped
            ),
        )
        .with_metadata(serde_json::json!({
            "template": template.name,
            "placed": report.placed,
            "skipped": report.skipped,
        }))
    });

    tracing::info!(
        template = %template.name,
        placed = report.placed,
        skipped = report.skipped,
        "world template applied"
    );
    Ok((report, draft))
}

/// Set a god rule and persist the override.
///
/// Known keys are clamped to their bounds and the clamped value is what
/// gets stored; unknown keys pass through as free-form custom rules.
///
/// # Errors
///
/// Returns [`StorageError`] when persisting the override fails; the
/// in-memory registry is still updated so the running world and the store
/// reconcile on the next successful write.
pub async fn set_rule<R: Repository>(
    world: &mut WorldState,
    repository: &R,
    key: &str,
    value: serde_json::Value,
) -> Result<(RuleChange, Option<EventDraft>), StorageError> {
    let change = world.rules.set(key, value);

    let Some(stored) = change.stored_value() else {
        tracing::warn!(key, "god rule value not interpretable, ignored");
        return Ok((change, None));
    };

    repository
        .save_rule_override(key, serde_json::json!(stored))
        .await?;

    let description = match change {
        RuleChange::Clamped { requested, .. } => {
            format!("Rule {key} set to {stored} (requested {requested}, clamped)")
        }
        _ => format!("Rule {key} set to {stored}"),
    };
    let draft = EventDraft::new(EventType::RuleChanged, 6, format!("Rule {key} changed"), description)
        .with_metadata(serde_json::json!({ "key": key, "value": stored }));

    tracing::info!(key, value = stored, "god rule changed");
    Ok((change, Some(draft)))
}

/// The currently effective value of every known and custom rule.
pub fn rule_values(world: &WorldState) -> serde_json::Value {
    let effective = world.rules.effective();
    serde_json::json!({
        rules::MAX_WORLD_RADIUS: effective.max_world_radius(),
        rules::AGENT_MOVE_RANGE: effective.agent_move_range(),
        rules::RESOURCE_REGEN_MULTIPLIER: effective.resource_regen_multiplier(),
        rules::GATHER_YIELD: effective.gather_yield(),
        "custom": effective.values(),
    })
}

/// A point-in-time stats document for operators.
pub fn world_stats(world: &WorldState, log: &EventLog, current_tick: u64) -> serde_json::Value {
    serde_json::json!({
        "tick": current_tick,
        "world": world.snapshot(),
        "events_recorded": log.len(),
        "rules": rule_values(world),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use perpetua_types::Position;
    use perpetua_world::TemplatePlacement;

    use crate::storage::MemoryRepository;

    use super::*;

    fn seed_agents(count: usize) -> Vec<Agent> {
        (0..count)
            .map(|i| Agent::spawn(format!("g{i}"), Position::new(0, 0), 0))
            .collect()
    }

    #[test]
    fn genesis_is_one_shot() {
        let mut world = WorldState::new();
        let drafts = genesis(&mut world, seed_agents(3), Vec::new()).unwrap();
        // One genesis event plus one spawn per agent.
        assert_eq!(drafts.len(), 4);
        assert_eq!(world.agents.total_count(), 3);

        let again = genesis(&mut world, seed_agents(2), Vec::new()).unwrap();
        assert!(again.is_empty());
        assert_eq!(world.agents.total_count(), 3);
    }

    #[test]
    fn template_reapplication_places_nothing() {
        let mut world = WorldState::new();
        let template = WorldTemplate {
            name: String::from("spawn-shrine"),
            placements: vec![
                TemplatePlacement {
                    at: Position::new(0, 0),
                    kind: String::from("stone"),
                },
                TemplatePlacement {
                    at: Position::new(0, 1),
                    kind: String::from("stone"),
                },
            ],
        };

        let (first, draft) = apply_world_template(&mut world, &template, 1).unwrap();
        assert_eq!(first.placed, 2);
        assert_eq!(first.skipped, 0);
        assert!(draft.is_some());

        let (second, draft) = apply_world_template(&mut world, &template, 2).unwrap();
        assert_eq!(second.placed, 0);
        assert_eq!(second.skipped, first.placed);
        assert!(draft.is_none());
    }

    #[tokio::test]
    async fn set_rule_clamps_and_persists() {
        let mut world = WorldState::new();
        let repo = MemoryRepository::new();

        let (change, draft) = set_rule(
            &mut world,
            &repo,
            rules::RESOURCE_REGEN_MULTIPLIER,
            serde_json::json!(10.0),
        )
        .await
        .unwrap();
        assert!(matches!(change, RuleChange::Clamped { .. }));
        assert!(draft.is_some());
        // Clamped to the key's maximum of 5.
        let effective = world.rules.effective().resource_regen_multiplier();
        assert!((effective - 5.0).abs() < f64::EPSILON);

        let overrides = repo.load_rule_overrides().await.unwrap();
        assert_eq!(
            overrides.get(rules::RESOURCE_REGEN_MULTIPLIER),
            Some(&serde_json::json!(5.0))
        );
    }

    #[tokio::test]
    async fn custom_rules_pass_through_unclamped() {
        let mut world = WorldState::new();
        let repo = MemoryRepository::new();

        let (change, _) = set_rule(
            &mut world,
            &repo,
            "gravity_strength",
            serde_json::json!(2.5),
        )
        .await
        .unwrap();
        assert!(matches!(change, RuleChange::Stored(_)));
        let effective = world.rules.effective().value("gravity_strength", 0.0);
        assert!((effective - 2.5).abs() < f64::EPSILON);
    }
}
