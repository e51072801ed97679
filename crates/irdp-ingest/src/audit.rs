//! Run audit events
//!
//! The orchestrator announces phase transitions and day summaries as
//! structured events. The default sink forwards them to the tracing
//! pipeline; tests swap in an in-memory sink to assert on what a run
//! reported.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

/// One audit record. `detail` is free-form JSON; summary events carry the
/// per-day counters there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub level: AuditLevel,
    /// Emitting component ("orchestrator", "edinet", ..)
    pub component: String,
    /// What happened ("phase_change", "day_summary", ..)
    pub action: String,
    pub detail: Value,
}

impl AuditEvent {
    pub fn info(component: &str, action: &str, detail: Value) -> Self {
        Self {
            level: AuditLevel::Info,
            component: component.to_string(),
            action: action.to_string(),
            detail,
        }
    }

    pub fn warn(component: &str, action: &str, detail: Value) -> Self {
        Self {
            level: AuditLevel::Warn,
            component: component.to_string(),
            action: action.to_string(),
            detail,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: every event becomes one structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: AuditEvent) {
        let detail = event.detail.to_string();
        match event.level {
            AuditLevel::Info => {
                info!(component = event.component, action = event.action, detail, "audit")
            },
            AuditLevel::Warn => {
                warn!(component = event.component, action = event.action, detail, "audit")
            },
            AuditLevel::Error => {
                error!(component = event.component, action = event.action, detail, "audit")
            },
        }
    }
}

/// Collecting sink for tests.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
