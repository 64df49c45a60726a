//! Audit sinks for pipeline events.

use std::sync::Mutex;
use tracing::{info, warn};
use venturi_core::{AuditEvent, AuditKind};

/// Receives every audit event the pipeline emits.
pub trait AuditSink: Send + Sync {
    /// Record one event. Must not block.
    fn record(&self, event: &AuditEvent);
}

/// Emits audit events as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event.kind {
            AuditKind::PhaseTransition
            | AuditKind::Deployed
            | AuditKind::Kept
            | AuditKind::RolledBack => info!(
                kind = event.kind.as_str(),
                subject = %event.subject,
                "{}",
                event.message
            ),
            AuditKind::PhaseDegraded
            | AuditKind::ValidationRejected
            | AuditKind::ManualReviewFiled
            | AuditKind::Deferred
            | AuditKind::DeployFailed
            | AuditKind::AdapterUnavailable
            | AuditKind::AdapterDegraded => warn!(
                kind = event.kind.as_str(),
                subject = %event.subject,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps audit events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Recorded events of one kind.
    pub fn of_kind(&self, kind: AuditKind) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_kind() {
        let sink = MemoryAuditSink::new();
        sink.record(&AuditEvent::new(AuditKind::Deployed, "ingest", "deployed"));
        sink.record(&AuditEvent::new(AuditKind::RolledBack, "ingest", "rolled back"));
        TracingAuditSink.record(&AuditEvent::new(AuditKind::Deferred, "ingest", "locked"));

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.of_kind(AuditKind::RolledBack).len(), 1);
    }
}
