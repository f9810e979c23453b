//! Capability trait — the abstraction over the agent's external effects.
//!
//! Capabilities are the engine's only way to act on the world: post a
//! payment, export a report, query the knowledge base, navigate a screen.
//! Business modules register them by name; the engine knows nothing of
//! their semantics.
//!
//! The central failure-containment invariant lives here: `invoke` always
//! returns a textual observation and never errors. A bad capability call
//! degrades one reasoning step, never the conversation.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audit::{AuditRecord, AuditSink};
use crate::context::ExecutionContext;
use crate::error::CapabilityError;
use crate::message::CapabilityCall;

/// A capability's advertisement to the model.
///
/// `input_schema` is a structural JSON schema used both for validating
/// model-generated arguments and for telling the model how to parameterize
/// the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Unique, stable identifier.
    pub name: String,

    /// Natural-language description shown to the model.
    pub description: String,

    /// Structural schema for the capability's input.
    pub input_schema: serde_json::Value,
}

/// The structured payload returned as the observation when an invocation
/// fails. The model sees this and can retry with corrected arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePayload {
    pub success: bool,
    pub error: String,
}

impl FailurePayload {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }

    /// Serialize to the observation text. Infallible for this shape.
    pub fn to_observation(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"success":false,"error":"{}"}}"#, self.error)
        })
    }
}

/// The core Capability trait.
///
/// Each capability implements this trait and is registered in the
/// [`CapabilityRegistry`]. The effect function receives validated input and
/// the caller's execution context.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability (e.g., "get_current_weather").
    fn name(&self) -> &str;

    /// A description of what this capability does (sent to the model).
    fn description(&self) -> &str;

    /// Structural schema describing this capability's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the effect with validated input.
    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> std::result::Result<String, CapabilityError>;

    /// Convert this capability into a descriptor for the manifest.
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

// ── Structural schema validation ──────────────────────────────────────────

/// Validate a value against a structural schema.
///
/// Supports the subset the manifest uses: `type` tags (object, array,
/// string, number, integer, boolean, null), `required` keys, nested
/// `properties`, `items`, and `enum` membership. Unknown keywords pass.
pub fn validate_schema(
    schema: &serde_json::Value,
    value: &serde_json::Value,
) -> std::result::Result<(), String> {
    validate_at(schema, value, "$")
}

fn validate_at(
    schema: &serde_json::Value,
    value: &serde_json::Value,
    path: &str,
) -> std::result::Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        let ok = match expected {
            "object" => value.is_object(),
            "array" => value.is_array(),
            "string" => value.is_string(),
            "number" => value.is_number(),
            "integer" => value.is_i64() || value.is_u64(),
            "boolean" => value.is_boolean(),
            "null" => value.is_null(),
            _ => true,
        };
        if !ok {
            return Err(format!(
                "{path}: expected {expected}, got {}",
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(value) {
            return Err(format!("{path}: value not in enum"));
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if !obj.contains_key(key) {
                    return Err(format!("{path}: missing required field: {key}"));
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, prop_schema) in properties {
                if let Some(prop_value) = obj.get(key) {
                    validate_at(prop_schema, prop_value, &format!("{path}.{key}"))?;
                }
            }
        }
    }

    if let Some(arr) = value.as_array() {
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in arr.iter().enumerate() {
                validate_at(item_schema, item, &format!("{path}[{i}]"))?;
            }
        }
    }

    Ok(())
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

/// A registry of available capabilities.
///
/// Read-only after initialization, so it can be shared via `Arc` across
/// concurrent runs. The engine uses it to:
/// 1. Build the manifest sent to the model
/// 2. Look up and invoke capabilities when the model requests them
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            audit: None,
        }
    }

    /// Attach an audit sink for failure recording.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Register a capability. Replaces any existing one with the same name.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        self.capabilities.insert(name, capability);
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    /// Get the full manifest (for advertisement to the model).
    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        let mut descriptors: Vec<CapabilityDescriptor> = self
            .capabilities
            .values()
            .map(|c| c.descriptor())
            .collect();
        // Stable manifest order keeps prompt assembly deterministic.
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// List all registered capability names.
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Invoke a capability call parsed from a model response.
    ///
    /// Always returns an observation, never errors:
    /// - malformed argument JSON, unknown names, and schema violations all
    ///   become `{"success":false,"error":…}` payloads;
    /// - effect-function errors and panics are caught and converted the
    ///   same way;
    /// - failures are recorded to the audit sink best-effort.
    pub async fn invoke(&self, call: &CapabilityCall, ctx: &ExecutionContext) -> String {
        let raw = call.arguments.trim();
        let input: serde_json::Value = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            match serde_json::from_str(raw) {
                Ok(value) => value,
                Err(e) => {
                    return self
                        .fail(
                            &call.name,
                            &format!("arguments are not valid JSON: {e}"),
                            serde_json::Value::String(call.arguments.clone()),
                            ctx,
                        )
                        .await;
                }
            }
        };
        self.invoke_with_value(&call.name, input, ctx).await
    }

    /// Invoke with pre-parsed arguments.
    pub async fn invoke_with_value(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> String {
        let Some(capability) = self.capabilities.get(name) else {
            return self
                .fail(name, &format!("unknown capability: {name}"), input, ctx)
                .await;
        };

        if let Err(reason) = validate_schema(&capability.input_schema(), &input) {
            return self.fail(name, &reason, input, ctx).await;
        }

        debug!(capability = name, "Executing capability");
        let execution = std::panic::AssertUnwindSafe(capability.execute(input.clone(), ctx))
            .catch_unwind()
            .await;

        match execution {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => self.fail(name, &e.to_string(), input, ctx).await,
            Err(_) => {
                self.fail(name, "capability panicked during execution", input, ctx)
                    .await
            }
        }
    }

    /// Build the failure observation and record it best-effort.
    async fn fail(
        &self,
        name: &str,
        error: &str,
        input: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> String {
        warn!(capability = name, error = error, "Capability invocation failed");

        if let Some(sink) = &self.audit {
            let record = AuditRecord::failure(name, error, input, ctx);
            if let Err(sink_err) = sink.record(record).await {
                warn!(capability = name, error = %sink_err, "Audit write failed");
            }
        }

        FailurePayload::new(error).to_observation()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
