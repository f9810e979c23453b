//! Audit sinks — where capability failure records are written.
//!
//! The registry records every validation or execution failure best-effort;
//! these sinks are the destinations. All sinks are append-only and tolerate
//! concurrent writers.

use async_trait::async_trait;
use deskhand_core::audit::{AuditRecord, AuditSink};
use std::sync::Mutex;

/// In-memory audit sink that stores records in a vector.
/// Useful for testing and small deployments.
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Get all recorded entries.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Get records for a single capability.
    pub fn records_for(&self, capability: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.capability == capability)
            .cloned()
            .collect()
    }

    /// Count of stored records.
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Clear all stored records.
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.records.lock().unwrap().len();
        f.debug_struct("MemoryAuditSink")
            .field("record_count", &count)
            .finish()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), String> {
        self.records
            .lock()
            .map_err(|e| format!("audit store poisoned: {e}"))?
            .push(record);
        Ok(())
    }
}

/// A tracing-based audit sink that logs records via `tracing::warn!`.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), String> {
        tracing::warn!(
            capability = %record.capability,
            error = %record.error,
            session_id = ?record.session_id,
            tenant_id = ?record.tenant_id,
            input = %record.input,
            "AUDIT capability failure"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskhand_core::ExecutionContext;
    use std::sync::Arc;

    fn record(capability: &str) -> AuditRecord {
        AuditRecord::failure(
            capability,
            "missing required field: amount",
            serde_json::json!({"currency": "EUR"}),
            &ExecutionContext::new().with_tenant("acme"),
        )
    }

    #[tokio::test]
    async fn memory_sink_stores_records() {
        let sink = MemoryAuditSink::new();
        sink.record(record("charge_payment")).await.unwrap();
        sink.record(record("export_report")).await.unwrap();

        assert_eq!(sink.count(), 2);
        let records = sink.records();
        assert_eq!(records[0].capability, "charge_payment");
        assert_eq!(records[0].tenant_id.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn filter_by_capability() {
        let sink = MemoryAuditSink::new();
        sink.record(record("charge_payment")).await.unwrap();
        sink.record(record("charge_payment")).await.unwrap();
        sink.record(record("export_report")).await.unwrap();

        assert_eq!(sink.records_for("charge_payment").len(), 2);
        assert_eq!(sink.records_for("export_report").len(), 1);
        assert!(sink.records_for("unknown").is_empty());
    }

    #[tokio::test]
    async fn clear_records() {
        let sink = MemoryAuditSink::new();
        sink.record(record("charge_payment")).await.unwrap();
        assert_eq!(sink.count(), 1);
        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn concurrent_writers_all_land() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.record(record(&format!("capability_{i}"))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(sink.count(), 16);
    }

    #[tokio::test]
    async fn tracing_sink_accepts_records() {
        let sink = TracingAuditSink;
        assert!(sink.record(record("charge_payment")).await.is_ok());
    }

    #[test]
    fn debug_format() {
        let sink = MemoryAuditSink::new();
        let debug = format!("{sink:?}");
        assert!(debug.contains("MemoryAuditSink"));
        assert!(debug.contains("record_count"));
    }
}
