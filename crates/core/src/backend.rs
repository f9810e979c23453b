//! Inference backend trait — the abstraction over the chat-completion
//! endpoint.
//!
//! A backend sends an assembled message list plus the capability manifest
//! and yields typed updates as the response streams in. The HTTP
//! implementation lives in `deskhand-inference`; tests use scripted mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityDescriptor;
use crate::error::InferenceError;
use crate::message::{CapabilityCall, Message};

/// One inference call's worth of input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// The model to use.
    pub model: String,

    /// The assembled messages.
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Capability manifest advertised to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<CapabilityDescriptor>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A semantic update parsed from the streamed response.
///
/// Text deltas arrive incrementally; exactly one of the two terminal
/// variants arrives when the stream ends — `CapabilityCalls` if the turn
/// requested any capabilities, otherwise `Final` with the accumulated text.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceUpdate {
    /// Incremental text content, in arrival order.
    TextDelta(String),

    /// The turn's full list of requested capability calls.
    CapabilityCalls(Vec<CapabilityCall>),

    /// The turn is complete; carries the accumulated full text.
    Final(String),
}

/// The inference backend trait.
///
/// The execution loop calls `stream_chat` without knowing which transport
/// is behind it.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Send a request and receive a stream of updates.
    ///
    /// Transport and protocol faults are surfaced as `Err` items on the
    /// channel (or an `Err` return before streaming starts) and abort the
    /// run — they are never silently retried.
    async fn stream_chat(
        &self,
        request: InferenceRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<InferenceUpdate, InferenceError>>,
        InferenceError,
    >;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization_skips_empty_tools() {
        let request = InferenceRequest {
            model: "llama3.2".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("tools"));
        assert!(!json.contains("max_tokens"));
    }

    #[test]
    fn update_equality() {
        assert_eq!(
            InferenceUpdate::TextDelta("a".into()),
            InferenceUpdate::TextDelta("a".into())
        );
        assert_ne!(
            InferenceUpdate::Final("a".into()),
            InferenceUpdate::TextDelta("a".into())
        );
    }
}
