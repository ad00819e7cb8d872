//! Composable filter for audit log queries.
//!
//! All criteria are AND-combined. `Default::default()` matches everything.

use chrono::{DateTime, Utc};

use crate::audit::record::{AuditKind, AuditOutcome, AuditRecord};
use crate::gate::ActionClass;

#[derive(Debug, Default, Clone)]
pub struct AuditFilter {
    pub tool_name: Option<String>,
    pub action_class: Option<ActionClass>,
    pub outcome: Option<AuditOutcome>,
    pub kind: Option<AuditKind>,
    /// Only records at or after this timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent N matches (still returned oldest first).
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    pub fn class(mut self, class: ActionClass) -> Self {
        self.action_class = Some(class);
        self
    }

    pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn kind(mut self, kind: AuditKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(ref name) = self.tool_name
            && record.tool_name.as_deref() != Some(name.as_str())
        {
            return false;
        }
        if let Some(class) = self.action_class
            && record.action_class != class
        {
            return false;
        }
        if let Some(outcome) = self.outcome
            && record.outcome != outcome
        {
            return false;
        }
        if let Some(kind) = self.kind
            && record.kind != kind
        {
            return false;
        }
        if let Some(since) = self.since
            && record.timestamp < since
        {
            return false;
        }
        true
    }

    /// Apply the filter to records already in insertion order.
    pub(crate) fn apply<'a>(
        &self,
        records: impl IntoIterator<Item = &'a AuditRecord>,
    ) -> Vec<AuditRecord> {
        let mut out: Vec<AuditRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        if let Some(limit) = self.limit
            && out.len() > limit
        {
            out.drain(..out.len() - limit);
        }
        out
    }
}
