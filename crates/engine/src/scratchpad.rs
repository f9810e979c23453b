//! Scratchpad — the action/observation record for one reasoning episode.
//!
//! Scoped to a single `run()` call: never persisted, never shared across
//! concurrent runs. Rendered back into the next prompt so the model can
//! condition on what already happened this turn.

use deskhand_core::message::CapabilityCall;
use serde::{Deserialize, Serialize};

/// One completed reason-act-observe step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    /// The capability call the model requested.
    pub call: CapabilityCall,

    /// The textual result fed back as context.
    pub observation: String,
}

/// The accumulated steps of the current reasoning episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratchpad {
    pub steps: Vec<AgentStep>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed step.
    pub fn push(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Render the steps as (capability, arguments, observation) triples for
    /// prompt injection.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!(
                "{}. [Action] {}({})\n   [Observation] {}\n",
                i + 1,
                step.call.name,
                step.call.arguments,
                step.observation
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str, arguments: &str, observation: &str) -> AgentStep {
        AgentStep {
            call: CapabilityCall {
                id: format!("call_{name}"),
                name: name.into(),
                arguments: arguments.into(),
            },
            observation: observation.into(),
        }
    }

    #[test]
    fn new_scratchpad_is_empty() {
        let pad = Scratchpad::new();
        assert!(pad.is_empty());
        assert_eq!(pad.len(), 0);
        assert!(pad.render().is_empty());
    }

    #[test]
    fn render_numbers_triples_in_order() {
        let mut pad = Scratchpad::new();
        pad.push(step(
            "get_current_weather",
            r#"{"latitude":0,"longitude":0}"#,
            "18°C, overcast",
        ));
        pad.push(step("evaluate_expression", r#"{"expression":"2+2"}"#, "4"));

        let rendered = pad.render();
        assert!(rendered.contains("1. [Action] get_current_weather"));
        assert!(rendered.contains("[Observation] 18°C, overcast"));
        assert!(rendered.contains("2. [Action] evaluate_expression"));
        assert!(
            rendered.find("get_current_weather").unwrap()
                < rendered.find("evaluate_expression").unwrap()
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let mut pad = Scratchpad::new();
        pad.push(step("a", "{}", "done"));

        let json = serde_json::to_string(&pad).unwrap();
        let back: Scratchpad = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.steps[0].call.name, "a");
    }
}
