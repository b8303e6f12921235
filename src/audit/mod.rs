//! Append-only audit trail for boundary events.
//!
//! Events are handed to an [`AuditSink`]. The default sink writes through
//! `tracing`; tests substitute [`MemoryAuditSink`]. Emission never fails and
//! never changes the outcome of the request that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tool parameters above this size are flagged as truncated in audit records.
pub const MAX_AUDITED_PARAM_BYTES: usize = 4096;

/// Outcome recorded with request-scoped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Error,
}

/// One boundary event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    McpRequest {
        method: String,
        request_id: String,
        client_ip: String,
        duration_ms: u64,
        result: AuditResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ToolCall {
        tool_name: String,
        request_id: String,
        client_ip: String,
        duration_ms: u64,
        param_size: usize,
        truncated: bool,
    },
    AiProxy {
        provider: String,
        client_ip: String,
        origin: String,
        user_agent: String,
        message_count: usize,
        duration_ms: u64,
        result: AuditResult,
    },
    RateLimit {
        client_ip: String,
        path: String,
        method: String,
    },
    CorsRejected {
        client_ip: String,
        origin: String,
        path: String,
    },
    AuthFailure {
        client_ip: String,
        path: String,
        reason: String,
    },
}

impl AuditEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::McpRequest { .. } => "mcp_request",
            AuditEvent::ToolCall { .. } => "tool_call",
            AuditEvent::AiProxy { .. } => "ai_proxy",
            AuditEvent::RateLimit { .. } => "rate_limit",
            AuditEvent::CorsRejected { .. } => "cors_rejected",
            AuditEvent::AuthFailure { .. } => "auth_failure",
        }
    }
}

/// Timestamped event as delivered to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Receiver of audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Writes every record as a structured `tracing` event.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        let payload = serde_json::to_string(&record).unwrap_or_default();
        tracing::info!(
            target: "pdb_advisor::audit",
            kind = record.event.kind(),
            timestamp = %record.timestamp.to_rfc3339(),
            event = %payload,
            "audit"
        );
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Records whose kind matches, e.g. `"auth_failure"`.
    pub fn of_kind(&self, kind: &str) -> Vec<AuditEvent> {
        self.records()
            .into_iter()
            .filter(|r| r.event.kind() == kind)
            .map(|r| r.event)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

/// Front door used by the HTTP layer: stamps, filters and isolates the sink.
#[derive(Clone)]
pub struct Auditor {
    sink: Arc<dyn AuditSink>,
    enabled: bool,
}

impl Auditor {
    pub fn new(sink: Arc<dyn AuditSink>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    pub fn tracing(enabled: bool) -> Self {
        Self::new(Arc::new(TracingAuditSink), enabled)
    }

    /// Emit with the current time as timestamp.
    pub fn emit(&self, event: AuditEvent) {
        self.emit_at(event, None);
    }

    /// Emit with an explicit timestamp, defaulting to now when `None`.
    pub fn emit_at(&self, event: AuditEvent, timestamp: Option<DateTime<Utc>>) {
        if !self.enabled {
            return;
        }
        let record = AuditRecord {
            timestamp: timestamp.unwrap_or_else(Utc::now),
            event,
        };
        let sink = Arc::clone(&self.sink);
        if std::panic::catch_unwind(AssertUnwindSafe(move || sink.record(record))).is_err() {
            tracing::error!("audit sink panicked; record dropped");
        }
    }
}

/// Whole milliseconds of a duration, saturating.
pub fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
