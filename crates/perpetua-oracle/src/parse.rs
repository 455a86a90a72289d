//! Oracle reply parsing into typed decisions.
//!
//! The backend returns raw text (ideally JSON). This module extracts and
//! validates it into a [`ProposedAction`] plus optional memory and concept
//! payloads. The caller maps a parse failure to the observe fallback; this
//! module never invents an action.

use perpetua_types::{ConceptProposal, ProposedAction};

use crate::error::OracleError;

/// A parsed oracle reply, before cost metering.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// The action the oracle chose.
    pub action: ProposedAction,
    /// A memory fragment to append to the agent.
    pub new_memory: Option<String>,
    /// A concept the oracle wants to coin.
    pub concept: Option<ConceptProposal>,
    /// The oracle's reasoning, logged but never acted on.
    pub reasoning: Option<String>,
}

/// Intermediate struct for deserializing the oracle's raw JSON reply.
///
/// The expected shape is a flat object with a tagged `action`, e.g.
/// `{"action": {"type": "move", "to": {"x": 3, "y": 4}}, "memory": "...",
/// "concept": {...}, "reasoning": "..."}`.
#[derive(Debug, serde::Deserialize)]
struct RawReply {
    action: serde_json::Value,
    #[serde(default)]
    memory: Option<String>,
    #[serde(default)]
    concept: Option<ConceptProposal>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Parse a raw oracle reply through multiple recovery strategies:
///
/// 1. Direct `serde_json` deserialization
/// 2. Extract JSON from a markdown code block
/// 3. Strip trailing commas and retry
/// 4. Code block extraction followed by comma stripping
///
/// # Errors
///
/// Returns [`OracleError::Parse`] if every strategy fails or the action
/// payload is not a known action.
pub fn parse_reply(raw: &str) -> Result<ParsedReply, OracleError> {
    let trimmed = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<RawReply>(trimmed) {
        return convert_raw_reply(parsed);
    }

    if let Some(json_str) = extract_json_from_codeblock(trimmed)
        && let Ok(parsed) = serde_json::from_str::<RawReply>(json_str)
    {
        return convert_raw_reply(parsed);
    }

    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(parsed) = serde_json::from_str::<RawReply>(&cleaned) {
        return convert_raw_reply(parsed);
    }

    if let Some(json_str) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(json_str);
        if let Ok(parsed) = serde_json::from_str::<RawReply>(&cleaned_inner) {
            return convert_raw_reply(parsed);
        }
    }

    Err(OracleError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Convert a deserialized raw reply into a typed decision.
fn convert_raw_reply(raw: RawReply) -> Result<ParsedReply, OracleError> {
    let action = parse_action(raw.action)?;
    Ok(ParsedReply {
        action,
        new_memory: raw.memory.filter(|m| !m.trim().is_empty()),
        concept: raw.concept,
        reasoning: raw.reasoning,
    })
}

/// Parse the tagged action payload.
///
/// Tries the typed enum first; falls back to lower-casing the `type` tag
/// for backends that capitalize variant names.
fn parse_action(value: serde_json::Value) -> Result<ProposedAction, OracleError> {
    if let Ok(action) = serde_json::from_value::<ProposedAction>(value.clone()) {
        return Ok(action);
    }

    let mut normalized = value;
    if let Some(tag) = normalized
        .get("type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_lowercase)
        && let Some(object) = normalized.as_object_mut()
    {
        object.insert(String::from("type"), serde_json::Value::String(tag));
    }
    serde_json::from_value::<ProposedAction>(normalized)
        .map_err(|e| OracleError::Parse(format!("unknown action payload: {e}")))
}

/// Extract JSON from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text
        .find("```json")
        .map(|i| after_fence(text, i, 7))
        .or_else(|| text.find("```").map(|i| after_fence(text, i, 3)))?;
    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// Index of the first content character after a code fence opener.
fn after_fence(text: &str, fence_at: usize, fence_len: usize) -> usize {
    let after_tag = fence_at.checked_add(fence_len).unwrap_or(fence_at);
    text.get(after_tag..)
        .and_then(|s| s.find('\n'))
        .and_then(|nl| after_tag.checked_add(nl))
        .and_then(|pos| pos.checked_add(1))
        .unwrap_or(after_tag)
}

/// Strip trailing commas before closing braces and brackets (a common
/// backend error).
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut i = 0;
    while i < len {
        let c = chars.get(i).copied().unwrap_or(' ');
        if c == ',' {
            let mut j = i.checked_add(1).unwrap_or(i);
            while j < len && chars.get(j).copied().unwrap_or(' ').is_whitespace() {
                j = j.checked_add(1).unwrap_or(j);
            }
            let next = chars.get(j).copied().unwrap_or(' ');
            if next == '}' || next == ']' {
                i = i.checked_add(1).unwrap_or(i);
                continue;
            }
        }
        result.push(c);
        i = i.checked_add(1).unwrap_or(len);
    }

    result
}
