//! Caller-facing streaming events.
//!
//! `StreamEvent` is the sole channel through which the engine communicates
//! progress — a gateway can forward these to clients over SSE or WebSocket
//! without any other shared state.
//!
//! - `text_delta`           — partial text token from the model
//! - `capability_requested` — the model asked for a capability invocation
//! - `capability_completed` — a capability invocation finished
//! - `final_answer`         — the turn is complete (also emitted on budget
//!   exhaustion, with an explicit message)
//! - `error`                — a network/protocol fault aborted the run

use serde::{Deserialize, Serialize};

/// Events emitted by the engine during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial text token from the model.
    TextDelta { content: String },

    /// The model requested a capability invocation.
    CapabilityRequested {
        id: String,
        name: String,
        arguments: String,
    },

    /// A capability invocation completed; `output` is the observation.
    CapabilityCompleted {
        id: String,
        name: String,
        output: String,
    },

    /// The final answer for this run.
    FinalAnswer { content: String },

    /// A network or protocol fault aborted the run.
    Error { message: String },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::CapabilityRequested { .. } => "capability_requested",
            Self::CapabilityCompleted { .. } => "capability_completed",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_text_delta() {
        let event = StreamEvent::TextDelta {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"text_delta""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_capability_requested() {
        let event = StreamEvent::CapabilityRequested {
            id: "call_1".into(),
            name: "get_current_weather".into(),
            arguments: r#"{"latitude":0,"longitude":0}"#.into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"capability_requested""#));
        assert!(json.contains(r#""name":"get_current_weather""#));
    }

    #[test]
    fn event_serialization_final_answer() {
        let event = StreamEvent::FinalAnswer {
            content: "Done.".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"final_answer""#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            StreamEvent::TextDelta { content: "x".into() }.event_type(),
            "text_delta"
        );
        assert_eq!(
            StreamEvent::CapabilityRequested {
                id: "a".into(),
                name: "b".into(),
                arguments: "{}".into()
            }
            .event_type(),
            "capability_requested"
        );
        assert_eq!(
            StreamEvent::CapabilityCompleted {
                id: "a".into(),
                name: "b".into(),
                output: "c".into()
            }
            .event_type(),
            "capability_completed"
        );
        assert_eq!(
            StreamEvent::FinalAnswer { content: "x".into() }.event_type(),
            "final_answer"
        );
        assert_eq!(
            StreamEvent::Error { message: "x".into() }.event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"text_delta","content":"hi"}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::TextDelta { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }
}
