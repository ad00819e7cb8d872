//! Audit record types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gate::{ActionClass, PolicyDecision};

/// What kind of event a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    /// A gated tool invocation.
    Invocation,
    /// A policy rule was set or removed.
    PolicyUpdate,
}

/// Lifecycle outcome of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Allowed; underlying tool running.
    Pending,
    /// Waiting on a confirmation channel.
    PendingConfirmation,
    Invoked,
    Rejected,
    Errored,
    /// A policy update took effect.
    Applied,
}

impl AuditOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuditOutcome::Pending | AuditOutcome::PendingConfirmation)
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditOutcome::Pending => "pending",
            AuditOutcome::PendingConfirmation => "pending_confirmation",
            AuditOutcome::Invoked => "invoked",
            AuditOutcome::Rejected => "rejected",
            AuditOutcome::Errored => "errored",
            AuditOutcome::Applied => "applied",
        };
        f.write_str(s)
    }
}

/// One gated decision and its rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    /// Position in the log, assigned on append.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    /// `None` for policy updates.
    pub tool_name: Option<String>,
    pub action_class: ActionClass,
    pub decision: PolicyDecision,
    pub rationale: String,
    pub outcome: AuditOutcome,
    /// Invocation parameters with sensitive values redacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Result summary or error text once the record is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Who changed a rule (policy updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl AuditRecord {
    /// Record for a tool invocation decision.
    pub fn invocation(
        tool_name: impl Into<String>,
        action_class: ActionClass,
        decision: PolicyDecision,
        rationale: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            kind: AuditKind::Invocation,
            tool_name: Some(tool_name.into()),
            action_class,
            decision,
            rationale: rationale.into(),
            outcome,
            params: None,
            summary: None,
            actor: None,
        }
    }

    /// Record for a policy rule change.
    pub fn policy_update(
        action_class: ActionClass,
        decision: PolicyDecision,
        rationale: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            kind: AuditKind::PolicyUpdate,
            tool_name: None,
            action_class,
            decision,
            rationale: rationale.into(),
            outcome: AuditOutcome::Applied,
            params: None,
            summary: None,
            actor: Some(actor.into()),
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_terminality() {
        assert!(!AuditOutcome::Pending.is_terminal());
        assert!(!AuditOutcome::PendingConfirmation.is_terminal());
        assert!(AuditOutcome::Invoked.is_terminal());
        assert!(AuditOutcome::Rejected.is_terminal());
        assert!(AuditOutcome::Errored.is_terminal());
        assert!(AuditOutcome::Applied.is_terminal());
    }

    #[test]
    fn test_record_serializes_wire_names() {
        let record = AuditRecord::invocation(
            "like_post",
            ActionClass::PublishSocial,
            PolicyDecision::Deny,
            "no likes",
            AuditOutcome::Rejected,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "INVOCATION");
        assert_eq!(json["action_class"], "PUBLISH_SOCIAL");
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["outcome"], "rejected");
        assert!(json.get("actor").is_none());
    }

    #[test]
    fn test_policy_update_record() {
        let record = AuditRecord::policy_update(
            ActionClass::FinancialTransaction,
            PolicyDecision::Deny,
            "freeze payments",
            "ops",
        );
        assert_eq!(record.kind, AuditKind::PolicyUpdate);
        assert!(record.tool_name.is_none());
        assert_eq!(record.outcome, AuditOutcome::Applied);
        assert_eq!(record.actor.as_deref(), Some("ops"));
    }
}
