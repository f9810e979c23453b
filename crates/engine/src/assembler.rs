//! Prompt assembly — builds the ordered message list for one inference
//! call.
//!
//! The system message is rendered from a directive template: its
//! `{capabilities}` placeholder receives the manifest (name, description,
//! schema as structured text) and, when the template carries a `{history}`
//! placeholder, the conversation transcript is substituted into that fixed
//! position instead of being appended as separate messages — letting the
//! same engine serve different prompt structures. The scratchpad of the
//! in-progress episode is appended so the model can condition on what
//! already happened this turn.
//!
//! Assembly is deterministic: identical inputs always produce identical
//! message lists.

use deskhand_core::capability::CapabilityDescriptor;
use deskhand_core::message::{Message, Role};
use deskhand_core::template;

use crate::scratchpad::Scratchpad;

/// The default agent directive. `{capabilities}` is filled with the
/// manifest at assembly time.
const DEFAULT_DIRECTIVE: &str = "\
You are the assistant built into a business-management platform. You help \
operators run their business: sales, accounting, inventory, staff, and \
customer records.

You can act through the capabilities listed below. To use one, request it \
with arguments matching its schema. Results will be returned to you as \
observations. When you have enough information, answer the user directly.

{capabilities}";

/// Stateless prompt assembler. Create one and reuse it.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    directive: String,
}

impl PromptAssembler {
    /// Create an assembler with a custom directive template.
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
        }
    }

    /// Whether the directive embeds history in a fixed template position.
    fn inlines_history(&self) -> bool {
        self.directive.contains("{history}")
    }

    /// Build the message list for one inference call.
    pub fn assemble(
        &self,
        manifest: &[CapabilityDescriptor],
        history: &[Message],
        scratchpad: &Scratchpad,
    ) -> Vec<Message> {
        let manifest_text = Self::render_manifest(manifest);

        let mut vars: Vec<(&str, &str)> = vec![("capabilities", manifest_text.as_str())];
        let transcript;
        if self.inlines_history() {
            transcript = Self::render_transcript(history);
            vars.push(("history", transcript.as_str()));
        }

        let mut system = template::render(&self.directive, &vars);

        if !scratchpad.is_empty() {
            system.push_str("\n\nProgress so far this turn:\n");
            system.push_str(&scratchpad.render());
        }

        let mut messages = vec![Message::system(system)];
        if !self.inlines_history() {
            messages.extend(history.iter().cloned());
        }
        messages
    }

    /// Render the capability manifest as structured text so the model can
    /// select and parameterize capabilities.
    fn render_manifest(manifest: &[CapabilityDescriptor]) -> String {
        if manifest.is_empty() {
            return "No capabilities are available this turn.".into();
        }

        let mut out = String::from("Available capabilities:\n");
        for descriptor in manifest {
            out.push_str(&format!(
                "- {}: {}\n  input schema: {}\n",
                descriptor.name,
                descriptor.description,
                serde_json::to_string(&descriptor.input_schema).unwrap_or_default()
            ));
        }
        out
    }

    /// Render history as a plain transcript for `{history}` substitution.
    fn render_transcript(history: &[Message]) -> String {
        let mut out = String::new();
        for message in history {
            let label = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::ToolResult => "tool",
            };
            out.push_str(&format!("{label}: {}\n", message.content));
        }
        out
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTIVE)
    }
}
