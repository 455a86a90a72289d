//! Prompt construction for the decision oracle.
//!
//! The system prompt fixes the reply contract; the user prompt is the
//! perception serialized to JSON. Narration prompts for the chronicler are
//! built by the caller and passed through verbatim.

use perpetua_types::Perception;

/// The fixed system prompt establishing the reply contract.
pub const DECISION_SYSTEM_PROMPT: &str = r#"You are the mind of one agent in a persistent simulated world.
You receive the agent's perception as JSON and must reply with a single JSON object:

{
  "action": {"type": "..."},
  "memory": "optional short memory fragment",
  "concept": {"name": "...", "definition": "...", "effects": "..."},
  "reasoning": "optional short explanation"
}

Valid actions:
  {"type": "observe"}
  {"type": "move", "to": {"x": 0, "y": 0}}
  {"type": "place_block", "at": {"x": 0, "y": 0}, "kind": "stone"}
  {"type": "remove_block", "at": {"x": 0, "y": 0}}
  {"type": "gather", "feature": "<feature uuid>"}
  {"type": "claim_feature", "feature": "<feature uuid>"}

Reply with JSON only. Omit "memory" and "concept" unless you mean them."#;

/// Render the user prompt for one agent's decision.
///
/// Serialization of the perception cannot fail (all maps are
/// string-keyed), but a failure degrades to an empty perception rather
/// than panicking.
pub fn render_decision_prompt(perception: &Perception) -> String {
    serde_json::to_string_pretty(perception).unwrap_or_else(|_| String::from("{}"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use perpetua_types::{AgentId, Position, SelfView};

    use super::*;

    #[test]
    fn decision_prompt_is_perception_json() {
        let perception = Perception {
            tick: 3,
            self_view: SelfView {
                id: AgentId::new(),
                name: String::from("Vale"),
                position: Position::new(0, 0),
                energy: 80,
                memory_excerpt: Vec::new(),
                state_ext: BTreeMap::new(),
            },
            nearby_agents: Vec::new(),
            nearby_features: Vec::new(),
            nearby_blocks: Vec::new(),
            known_concepts: Vec::new(),
        };
        let prompt = render_decision_prompt(&perception);
        assert!(prompt.contains("\"tick\": 3"));
        assert!(prompt.contains("Vale"));
    }
}
