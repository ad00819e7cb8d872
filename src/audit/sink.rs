//! Forwarding sinks for audit records.
//!
//! The in-memory [`AuditLog`](crate::audit::AuditLog) is the ordering
//! authority. Sinks receive terminal records after they land there and may
//! observe concurrent invocations in a slightly different order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::audit::record::AuditRecord;

/// External observability collaborator for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn forward(&self, record: &AuditRecord) -> std::io::Result<()>;
}

/// Emits each record as a structured `tracing` event on target `toolgate::audit`.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn forward(&self, record: &AuditRecord) -> std::io::Result<()> {
        tracing::info!(
            target: "toolgate::audit",
            sequence = record.sequence,
            kind = ?record.kind,
            tool_name = record.tool_name.as_deref().unwrap_or("-"),
            action_class = %record.action_class,
            decision = %record.decision,
            outcome = %record.outcome,
            rationale = %record.rationale,
            "audit"
        );
        Ok(())
    }
}

/// Appends one JSON line per record to a file.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonlSink {
    /// Open or create the file for appending.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn forward(&self, record: &AuditRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(record).map_err(std::io::Error::other)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await
    }
}

/// Keeps forwarded records in memory. Useful for tests and embedding.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn forward(&self, record: &AuditRecord) -> std::io::Result<()> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}
