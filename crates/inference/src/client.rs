//! HTTP chat-completion client.
//!
//! Protocol: POST `{ model, messages, stream: true, tools? }`; the response
//! body is a newline-delimited sequence of JSON chunks, each
//! `{ "message": { "content"?, "tool_calls"? }, "done": bool }`. A single
//! turn may announce its capability calls across several chunks or in one.
//!
//! Chunk order as received defines text order. Call identifiers assigned by
//! the endpoint are preserved verbatim; when the endpoint omits one, the
//! assembler synthesizes `call_<index>` so tool results can always be
//! correlated.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use deskhand_config::EngineConfig;
use deskhand_core::backend::{InferenceBackend, InferenceRequest, InferenceUpdate};
use deskhand_core::error::InferenceError;
use deskhand_core::message::{CapabilityCall, Message};

use crate::decode::LineBuffer;

/// An HTTP inference backend for NDJSON chat-completion endpoints.
pub struct HttpInferenceClient {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpInferenceClient {
    /// Create a new client.
    ///
    /// `timeout` bounds the whole request from connection start through the
    /// end of the streamed body; on expiry the in-flight request is aborted.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "http".into(),
            endpoint: endpoint.into(),
            api_key,
            client,
        }
    }

    /// Create a client from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Convert engine messages to the wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.clone(),
                content: m.content.clone(),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(m.tool_calls.clone())
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(
        &self,
        request: InferenceRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<InferenceUpdate, InferenceError>>,
        InferenceError,
    > {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "stream": true,
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }

        debug!(endpoint = %self.endpoint, model = %request.model, "Sending streaming request");

        let mut http_request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {key}"));
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(e.to_string())
            } else {
                InferenceError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(InferenceError::RateLimited { retry_after_secs: 5 });
        }

        if status == 401 || status == 403 {
            return Err(InferenceError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Endpoint returned error");
            return Err(InferenceError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the byte stream, release complete lines, assemble updates.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::new();
            let mut assembler = StreamAssembler::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let error = if e.is_timeout() {
                            InferenceError::Timeout(e.to_string())
                        } else {
                            InferenceError::StreamInterrupted(e.to_string())
                        };
                        let _ = tx.send(Err(error)).await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match assembler.ingest_line(&line) {
                        Ok(Some(delta)) => {
                            if tx.send(Ok(InferenceUpdate::TextDelta(delta))).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }

                    if assembler.is_done() {
                        let _ = tx.send(Ok(assembler.take_final())).await;
                        return;
                    }
                }
            }

            // Stream ended without an explicit done flag.
            let _ = tx.send(Ok(assembler.take_final())).await;
        });

        Ok(rx)
    }
}

// ── Chunk assembly (transport-independent) ────────────────────────────────

/// Folds parsed chunks into the turn's accumulated text and call list.
///
/// Independent of the transport so the same logic can be driven with
/// arbitrarily fragmented input; the reconstructed output is
/// fragmentation-invariant.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    text: String,
    calls: Vec<CapabilityCall>,
    done: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one complete line. Returns the text delta to forward, if any.
    /// Blank lines are skipped; anything else must be a valid chunk.
    pub fn ingest_line(&mut self, line: &str) -> Result<Option<String>, InferenceError> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        let chunk: ChatChunk =
            serde_json::from_str(line).map_err(|e| InferenceError::MalformedChunk {
                line: truncate_line(line),
                reason: e.to_string(),
            })?;

        let mut delta = None;
        if let Some(message) = chunk.message {
            if let Some(content) = message.content
                && !content.is_empty()
            {
                self.text.push_str(&content);
                delta = Some(content);
            }
            if let Some(wire_calls) = message.tool_calls {
                for wire in wire_calls {
                    let index = self.calls.len();
                    self.calls.push(wire.into_call(index));
                }
            }
        }

        if chunk.done {
            self.done = true;
        }

        Ok(delta)
    }

    /// Whether an explicit done flag has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The accumulated full text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Produce the terminal update: the full call list if any calls were
    /// announced, otherwise the accumulated final text.
    pub fn take_final(&mut self) -> InferenceUpdate {
        if self.calls.is_empty() {
            InferenceUpdate::Final(std::mem::take(&mut self.text))
        } else {
            InferenceUpdate::CapabilityCalls(std::mem::take(&mut self.calls))
        }
    }
}

fn truncate_line(line: &str) -> String {
    const MAX: usize = 200;
    if line.len() <= MAX {
        line.to_string()
    } else {
        let mut end = MAX;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &line[..end])
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: deskhand_core::message::Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<CapabilityCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// One line of the streamed response.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireCall>>,
}

/// A capability call as it appears on the wire. Some endpoints send
/// `arguments` as a JSON object rather than a string; both are accepted.
#[derive(Debug, Deserialize)]
struct WireCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

impl WireCall {
    fn into_call(self, index: usize) -> CapabilityCall {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => format!("call_{index}"),
        };
        let arguments = match self.arguments {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => "{}".to_string(),
            other => other.to_string(),
        };
        CapabilityCall {
            id,
            name: self.name,
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskhand_core::message::Role;

    // ── Wire parsing ──

    #[test]
    fn parse_content_chunk() {
        let line = r#"{"message":{"content":"Hello"},"done":false}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        assert_eq!(chunk.message.unwrap().content.as_deref(), Some("Hello"));
        assert!(!chunk.done);
    }

    #[test]
    fn parse_done_chunk_without_message() {
        let line = r#"{"done":true}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        assert!(chunk.message.is_none());
        assert!(chunk.done);
    }

    #[test]
    fn parse_tool_call_with_object_arguments() {
        let line = r#"{"message":{"tool_calls":[{"id":"call_abc","name":"get_current_weather","arguments":{"latitude":0,"longitude":0}}]},"done":false}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        let calls = chunk.message.unwrap().tool_calls.unwrap();
        let call = calls.into_iter().next().unwrap().into_call(0);
        assert_eq!(call.id, "call_abc");
        assert_eq!(call.name, "get_current_weather");
        let args: serde_json::Value = serde_json::from_str(&call.arguments).unwrap();
        assert_eq!(args["latitude"], 0);
    }

    #[test]
    fn parse_tool_call_with_string_arguments() {
        let line = r#"{"message":{"tool_calls":[{"id":"c1","name":"calc","arguments":"{\"expression\":\"2+2\"}"}]},"done":false}"#;
        let chunk: ChatChunk = serde_json::from_str(line).unwrap();
        let call = chunk
            .message
            .unwrap()
            .tool_calls
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
            .into_call(0);
        assert_eq!(call.arguments, r#"{"expression":"2+2"}"#);
    }

    #[test]
    fn missing_id_synthesized_from_index() {
        let wire = WireCall {
            id: None,
            name: "calc".into(),
            arguments: serde_json::Value::Null,
        };
        let call = wire.into_call(3);
        assert_eq!(call.id, "call_3");
        assert_eq!(call.arguments, "{}");
    }

    // ── Assembler ──

    #[test]
    fn text_accumulates_in_chunk_order() {
        let mut asm = StreamAssembler::new();
        assert_eq!(
            asm.ingest_line(r#"{"message":{"content":"Hel"},"done":false}"#)
                .unwrap()
                .as_deref(),
            Some("Hel")
        );
        assert_eq!(
            asm.ingest_line(r#"{"message":{"content":"lo"},"done":false}"#)
                .unwrap()
                .as_deref(),
            Some("lo")
        );
        asm.ingest_line(r#"{"done":true}"#).unwrap();
        assert!(asm.is_done());
        assert_eq!(asm.take_final(), InferenceUpdate::Final("Hello".into()));
    }

    #[test]
    fn calls_accumulate_across_chunks() {
        let mut asm = StreamAssembler::new();
        asm.ingest_line(
            r#"{"message":{"tool_calls":[{"id":"a","name":"first","arguments":{}}]},"done":false}"#,
        )
        .unwrap();
        asm.ingest_line(
            r#"{"message":{"tool_calls":[{"id":"b","name":"second","arguments":{}}]},"done":true}"#,
        )
        .unwrap();

        match asm.take_final() {
            InferenceUpdate::CapabilityCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].id, "a");
                assert_eq!(calls[1].id, "b");
            }
            other => panic!("Expected CapabilityCalls, got {other:?}"),
        }
    }

    #[test]
    fn calls_take_precedence_over_text() {
        let mut asm = StreamAssembler::new();
        asm.ingest_line(r#"{"message":{"content":"Let me check."},"done":false}"#)
            .unwrap();
        asm.ingest_line(
            r#"{"message":{"tool_calls":[{"id":"x","name":"check","arguments":{}}]},"done":true}"#,
        )
        .unwrap();

        assert!(matches!(
            asm.take_final(),
            InferenceUpdate::CapabilityCalls(_)
        ));
    }

    #[test]
    fn malformed_line_is_a_hard_error() {
        let mut asm = StreamAssembler::new();
        let err = asm.ingest_line("{not json at all").unwrap_err();
        assert!(matches!(err, InferenceError::MalformedChunk { .. }));
    }

    #[test]
    fn blank_lines_skipped() {
        let mut asm = StreamAssembler::new();
        assert!(asm.ingest_line("").unwrap().is_none());
        assert!(asm.ingest_line("   ").unwrap().is_none());
    }

    #[test]
    fn empty_content_not_forwarded() {
        let mut asm = StreamAssembler::new();
        assert!(
            asm.ingest_line(r#"{"message":{"content":""},"done":false}"#)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn fragmentation_invariant_end_to_end() {
        let body: &[u8] = concat!(
            r#"{"message":{"content":"Th"},"done":false}"#,
            "\n",
            r#"{"message":{"content":"inking"},"done":false}"#,
            "\n",
            r#"{"message":{"tool_calls":[{"id":"call_1","name":"get_current_weather","arguments":{"latitude":0,"longitude":0}}]},"done":true}"#,
            "\n",
        )
        .as_bytes();

        // Reference: whole body at once.
        let reference = drive(body, body.len());

        // Byte-at-a-time and a few odd split sizes.
        for split in [1, 3, 7, 13, 40] {
            assert_eq!(drive(body, split), reference, "split size {split}");
        }
    }

    /// Feed `body` through LineBuffer + StreamAssembler in `split`-byte
    /// pieces, returning (accumulated text, final update).
    fn drive(body: &[u8], split: usize) -> (String, String) {
        let mut lines = LineBuffer::new();
        let mut asm = StreamAssembler::new();
        let mut text = String::new();

        for piece in body.chunks(split) {
            for line in lines.push(piece) {
                if let Some(delta) = asm.ingest_line(&line).unwrap() {
                    text.push_str(&delta);
                }
            }
        }
        let update = format!("{:?}", asm.take_final());
        (text, update)
    }

    // ── Request building ──

    #[test]
    fn message_conversion_roles() {
        let messages = vec![
            Message::system("directive"),
            Message::user("hello"),
            Message::tool_result("call_1", "{\"ok\":true}"),
        ];
        let api = HttpInferenceClient::to_api_messages(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, Role::System);
        assert_eq!(api[2].tool_call_id.as_deref(), Some("call_1"));
        let json = serde_json::to_string(&api[2]).unwrap();
        assert!(json.contains(r#""role":"tool_result""#));
    }

    #[test]
    fn message_conversion_preserves_call_metadata() {
        let call = CapabilityCall {
            id: "call_1".into(),
            name: "export_report".into(),
            arguments: r#"{"format":"csv"}"#.into(),
        };
        let msg = Message::assistant_with_calls("on it", vec![call]);
        let api = HttpInferenceClient::to_api_messages(&[msg]);
        let json = serde_json::to_string(&api[0]).unwrap();
        assert!(json.contains("export_report"));
        assert!(json.contains("call_1"));
    }

    #[test]
    fn from_config_uses_endpoint() {
        let config = EngineConfig {
            endpoint: "http://inference.internal/api/chat".into(),
            ..Default::default()
        };
        let client = HttpInferenceClient::from_config(&config);
        assert_eq!(client.endpoint, "http://inference.internal/api/chat");
        assert_eq!(client.name(), "http");
    }

    #[test]
    fn truncate_line_bounds_error_payloads() {
        let long = "x".repeat(500);
        let truncated = truncate_line(&long);
        assert!(truncated.len() < 250);
        assert!(truncated.ends_with('…'));
    }
}
