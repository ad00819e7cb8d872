//! In-memory append-only audit log.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::audit::filter::AuditFilter;
use crate::audit::record::{AuditOutcome, AuditRecord};
use crate::audit::sink::AuditSink;
use crate::error::AuditError;

/// Append-only record of every gated decision.
///
/// Sequence numbers equal insertion index. The only permitted change to an
/// existing record is the one-time transition of a pending record to its
/// terminal outcome. Terminal records are forwarded to every configured sink
/// after the in-memory append; sink failures never affect the log.
pub struct AuditLog {
    records: RwLock<Vec<AuditRecord>>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    /// Add a forwarding sink.
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append a record, returning its sequence number.
    pub async fn record(&self, mut entry: AuditRecord) -> u64 {
        let (sequence, forwarded) = {
            let mut records = self.records.write().await;
            let sequence = records.len() as u64;
            entry.sequence = sequence;
            let forwarded = entry.outcome.is_terminal().then(|| entry.clone());
            records.push(entry);
            (sequence, forwarded)
        };
        tracing::trace!(sequence, "Audit record appended");

        if let Some(record) = forwarded {
            self.forward(&record).await;
        }
        sequence
    }

    /// Move a pending record to its terminal outcome.
    pub async fn finalize(
        &self,
        sequence: u64,
        outcome: AuditOutcome,
        summary: Option<String>,
    ) -> Result<AuditRecord, AuditError> {
        if !outcome.is_terminal() {
            return Err(AuditError::NonTerminalOutcome(outcome));
        }

        let finalized = {
            let mut records = self.records.write().await;
            let record = records
                .get_mut(sequence as usize)
                .ok_or(AuditError::UnknownSequence(sequence))?;
            if record.outcome.is_terminal() {
                return Err(AuditError::AlreadyFinalized(sequence));
            }
            record.outcome = outcome;
            record.summary = summary;
            record.clone()
        };

        self.forward(&finalized).await;
        Ok(finalized)
    }

    /// Records matching `filter`, in insertion order.
    pub async fn query(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        let records = self.records.read().await;
        filter.apply(records.iter())
    }

    pub async fn get(&self, sequence: u64) -> Option<AuditRecord> {
        self.records.read().await.get(sequence as usize).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Exclusive hold on the records, for tests that need a stalled writer.
    #[cfg(test)]
    pub(crate) async fn write_lock(&self) -> tokio::sync::RwLockWriteGuard<'_, Vec<AuditRecord>> {
        self.records.write().await
    }

    async fn forward(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            if let Err(e) = sink.forward(record).await {
                tracing::warn!(
                    sink = sink.name(),
                    sequence = record.sequence,
                    error = %e,
                    "Audit sink failed to forward record"
                );
            }
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
