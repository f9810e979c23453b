//! Audit sink trait — best-effort recording of capability failures.
//!
//! Sinks are append-only and must tolerate concurrent writers. A sink
//! failure never affects the invocation that triggered the write; the
//! registry swallows it and logs locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;

/// A single recorded capability failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    /// Name of the capability that failed.
    pub capability: String,

    /// The error message that was returned as the observation.
    pub error: String,

    /// The original input, verbatim.
    pub input: serde_json::Value,

    /// Session scope from the execution context, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Tenant scope from the execution context, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl AuditRecord {
    /// Build a record for a failed invocation, lifting identifiers from the
    /// execution context.
    pub fn failure(
        capability: &str,
        error: &str,
        input: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            capability: capability.to_string(),
            error: error.to_string(),
            input,
            session_id: ctx.session_id.clone(),
            tenant_id: ctx.tenant_id.clone(),
        }
    }
}

/// Destination for audit records.
///
/// Implementations live in `deskhand-audit`; the registry only depends on
/// this trait.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an entry. Errors are reported as plain strings — the caller
    /// logs and discards them rather than letting observability concerns
    /// break the primary flow.
    async fn record(&self, record: AuditRecord) -> std::result::Result<(), String>;
}
