//! Message and Conversation domain types.
//!
//! These are the value objects that flow through the engine: the caller
//! submits a conversation, the loop extends it with assistant turns and
//! linked tool results, and returns the extended copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions (directive, capability manifest)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
    /// Result of a capability invocation, linked to the call that caused it
    ToolResult,
}

/// A single message in a conversation.
///
/// Messages are immutable once constructed. A `ToolResult` message's
/// `tool_call_id` must correspond to a [`CapabilityCall::id`] issued by a
/// preceding assistant message in the same conversation; the loop never
/// appends an orphaned tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Capability calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<CapabilityCall>,

    /// If this is a tool result, which capability call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::build(Role::System, content, Vec::new(), None)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, content, Vec::new(), None)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::build(Role::Assistant, content, Vec::new(), None)
    }

    /// Create an assistant message carrying the capability calls it requested.
    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<CapabilityCall>,
    ) -> Self {
        Self::build(Role::Assistant, content, tool_calls, None)
    }

    /// Create a tool result message linked to the call that produced it.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(
            Role::ToolResult,
            content,
            Vec::new(),
            Some(tool_call_id.into()),
        )
    }

    fn build(
        role: Role,
        content: impl Into<String>,
        tool_calls: Vec<CapabilityCall>,
        tool_call_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls,
            tool_call_id,
            timestamp: Utc::now(),
        }
    }
}

/// A capability call embedded in an assistant message.
///
/// Produced only by the inference client when parsing a model response;
/// the engine never hand-constructs one. Identifiers are assigned by the
/// inference endpoint and preserved verbatim so tool results can be
/// correlated later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Unique ID for this call within the turn
    pub id: String,

    /// Name of the capability to invoke
    pub name: String,

    /// Arguments as raw JSON text
    pub arguments: String,
}

/// A conversation is an append-only ordered sequence of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Post this invoice to the ledger");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Post this invoice to the ledger");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn tool_result_links_to_call() {
        let msg = Message::tool_result("call_1", "{\"success\":true}");
        assert_eq!(msg.role, Role::ToolResult);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn assistant_with_calls_carries_metadata() {
        let call = CapabilityCall {
            id: "call_9".into(),
            name: "get_current_weather".into(),
            arguments: r#"{"latitude":0,"longitude":0}"#.into(),
        };
        let msg = Message::assistant_with_calls("Checking the weather", vec![call.clone()]);
        assert_eq!(msg.tool_calls, vec![call]);
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::ToolResult).unwrap();
        assert_eq!(json, r#""tool_result""#);
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Test message");
        assert_eq!(deserialized.role, Role::User);
    }
}
