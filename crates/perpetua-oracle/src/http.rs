//! The HTTP-backed [`Oracle`] implementation.
//!
//! Wraps an [`OracleBackend`], the reply parser, and per-million-token
//! pricing. Costs are estimated from the usage the backend reports;
//! backends that omit usage meter as free.

use rust_decimal::Decimal;

use perpetua_types::Perception;

use crate::client::{BackendConfig, Completion, OracleBackend};
use crate::error::OracleError;
use crate::oracle::{Decision, Oracle};
use crate::parse::parse_reply;
use crate::prompt::{DECISION_SYSTEM_PROMPT, render_decision_prompt};

const ONE_MILLION: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Dollars per million input and output tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    /// Rate per million prompt tokens.
    pub input_rate: Decimal,
    /// Rate per million completion tokens.
    pub output_rate: Decimal,
}

impl Pricing {
    /// Estimated dollar cost of one completion.
    ///
    /// `cost = in/1M * input_rate + out/1M * output_rate`. Decimal
    /// division and multiplication here stay well inside the 96-bit
    /// mantissa; checked ops degrade to zero rather than panicking.
    pub fn cost_of(self, completion: &Completion) -> Decimal {
        let input_cost = Decimal::from(completion.input_tokens)
            .checked_div(ONE_MILLION)
            .unwrap_or(Decimal::ZERO)
            .checked_mul(self.input_rate)
            .unwrap_or(Decimal::ZERO);
        let output_cost = Decimal::from(completion.output_tokens)
            .checked_div(ONE_MILLION)
            .unwrap_or(Decimal::ZERO)
            .checked_mul(self.output_rate)
            .unwrap_or(Decimal::ZERO);
        input_cost.checked_add(output_cost).unwrap_or(Decimal::ZERO)
    }
}

/// A decision oracle backed by an LLM over HTTP.
pub struct HttpOracle {
    backend: OracleBackend,
    pricing: Pricing,
}

impl HttpOracle {
    /// Build an oracle from backend configuration and pricing.
    pub fn new(config: &BackendConfig, pricing: Pricing) -> Self {
        Self {
            backend: OracleBackend::from_config(config),
            pricing,
        }
    }
}

impl Oracle for HttpOracle {
    async fn decide(&self, perception: &Perception) -> Result<Decision, OracleError> {
        let user = render_decision_prompt(perception);
        let completion = self.backend.complete(DECISION_SYSTEM_PROMPT, &user).await?;
        let cost = self.pricing.cost_of(&completion);

        let reply = parse_reply(&completion.text)?;
        if let Some(reasoning) = &reply.reasoning {
            tracing::debug!(
                agent_id = %perception.self_view.id,
                tick = perception.tick,
                reasoning,
                "oracle reasoning"
            );
        }

        Ok(Decision {
            action: reply.action,
            new_memory: reply.new_memory,
            concept: reply.concept,
            reasoning: reply.reasoning,
            cost,
        })
    }

    async fn narrate(&self, prompt: &str) -> Result<(String, Decimal), OracleError> {
        let completion = self
            .backend
            .complete("You are the chronicler of a simulated world.", prompt)
            .await?;
        let cost = self.pricing.cost_of(&completion);
        Ok((completion.text, cost))
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn pricing_meters_per_million_tokens() {
        let pricing = Pricing {
            input_rate: dec!(3.00),
            output_rate: dec!(15.00),
        };
        let completion = Completion {
            text: String::new(),
            input_tokens: 1_000_000,
            output_tokens: 200_000,
        };
        assert_eq!(pricing.cost_of(&completion), dec!(6.00));
    }

    #[test]
    fn missing_usage_meters_as_free() {
        let pricing = Pricing {
            input_rate: dec!(3.00),
            output_rate: dec!(15.00),
        };
        let completion = Completion {
            text: String::new(),
            input_tokens: 0,
            output_tokens: 0,
        };
        assert_eq!(pricing.cost_of(&completion), Decimal::ZERO);
    }
}
