//! A scripted oracle for deterministic tests.
//!
//! Each agent gets a queue of behaviors consumed one per decision round.
//! An exhausted queue (or an agent with no script) observes. `Hang` never
//! resolves, which is how pipeline timeout handling is exercised.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use rust_decimal::Decimal;

use perpetua_types::{AgentId, ConceptProposal, Perception, ProposedAction};

use crate::error::OracleError;
use crate::oracle::{Decision, Oracle};

/// One scripted decision round for one agent.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Propose an action, optionally with memory and concept payloads.
    Act {
        /// The action to propose.
        action: ProposedAction,
        /// Memory fragment to attach.
        memory: Option<String>,
        /// Concept to attach.
        concept: Option<ConceptProposal>,
        /// Cost to report for this call.
        cost: Decimal,
    },
    /// Fail the call with a backend error.
    Fail,
    /// Never resolve; exercises the caller's timeout.
    Hang,
}

impl Behavior {
    /// An action with no payloads and zero cost.
    pub const fn act(action: ProposedAction) -> Self {
        Self::Act {
            action,
            memory: None,
            concept: None,
            cost: Decimal::ZERO,
        }
    }
}

/// Oracle that replays per-agent behavior queues.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    scripts: Mutex<BTreeMap<AgentId, VecDeque<Behavior>>>,
}

impl ScriptedOracle {
    /// Create an oracle with no scripts (everyone observes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a behavior to an agent's queue.
    pub fn script(&self, agent_id: AgentId, behavior: Behavior) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(agent_id).or_default().push_back(behavior);
        }
    }

    fn next_behavior(&self, agent_id: AgentId) -> Option<Behavior> {
        self.scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.get_mut(&agent_id).and_then(VecDeque::pop_front))
    }
}

impl Oracle for ScriptedOracle {
    async fn decide(&self, perception: &Perception) -> Result<Decision, OracleError> {
        match self.next_behavior(perception.self_view.id) {
            None => Ok(Decision::observe()),
            Some(Behavior::Act {
                action,
                memory,
                concept,
                cost,
            }) => Ok(Decision {
                action,
                new_memory: memory,
                concept,
                reasoning: None,
                cost,
            }),
            Some(Behavior::Fail) => Err(OracleError::Backend(String::from("scripted failure"))),
            Some(Behavior::Hang) => {
                std::future::pending::<()>().await;
                Ok(Decision::observe())
            }
        }
    }

    async fn narrate(&self, _prompt: &str) -> Result<(String, Decimal), OracleError> {
        Ok((String::from("An era passed, quietly."), Decimal::ZERO))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
