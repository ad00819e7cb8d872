//! The tool gate: wraps raw tools into policy-enforced ones.
//!
//! Invocation state machine of a [`GatedTool`]:
//!
//! ```text
//!   safety floor ──hit──▶ record(rejected) ──▶ PolicyViolation
//!        │
//!        ▼
//!    classify ──▶ evaluate
//!                   ├─ deny ─────────────▶ record(rejected) ──▶ PolicyViolation
//!                   ├─ allow ────────────▶ record(pending) ──▶ execute ──▶ invoked | errored
//!                   └─ require_confirmation
//!                          record(pending_confirmation) ──▶ confirm (with timeout)
//!                               ├─ granted ──▶ execute ──▶ invoked | errored
//!                               ├─ denied / cancelled ──▶ rejected ──▶ PolicyViolation
//!                               └─ timed out ──▶ rejected ──▶ ConfirmationTimeout
//! ```
//!
//! Every invocation leaves exactly one audit record with a terminal outcome,
//! including invocations whose future is dropped mid-flight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::audit::{AuditLog, AuditOutcome, AuditRecord};
use crate::error::GateError;
use crate::gate::classifier::{ActionClass, ActionClassifier};
use crate::gate::confirm::{
    ConfirmationRequest, ConfirmationResponse, Confirmer, DenyAllConfirmer,
};
use crate::gate::policy::{PolicyDecision, PolicyEngine, PolicyRule};
use crate::gate::safety::{self, SAFETY_FLOOR_RATIONALE};
use crate::tools::redaction::redact_sensitive_json;
use crate::tools::{Tool, ToolDescriptor, ToolError, ToolOutput};

/// Default time to wait for a confirmation before denying.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Composes classification, policy, confirmation and audit.
///
/// Cheap to clone; every gated tool holds its own handle.
#[derive(Clone)]
pub struct ToolGate {
    classifier: Arc<ActionClassifier>,
    policy: Arc<PolicyEngine>,
    audit: Arc<AuditLog>,
    confirmer: Arc<dyn Confirmer>,
    confirmation_timeout: Duration,
}

impl ToolGate {
    pub fn new(
        classifier: Arc<ActionClassifier>,
        policy: Arc<PolicyEngine>,
        audit: Arc<AuditLog>,
        confirmer: Arc<dyn Confirmer>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            policy,
            audit,
            confirmer,
            confirmation_timeout,
        }
    }

    /// Gate that denies every confirmation request until a confirmer is set.
    pub fn without_confirmation(
        classifier: Arc<ActionClassifier>,
        policy: Arc<PolicyEngine>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self::new(
            classifier,
            policy,
            audit,
            Arc::new(DenyAllConfirmer),
            DEFAULT_CONFIRMATION_TIMEOUT,
        )
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn wrap(&self, descriptor: ToolDescriptor) -> GatedTool {
        GatedTool {
            inner: descriptor,
            gate: self.clone(),
        }
    }

    pub fn classifier(&self) -> &ActionClassifier {
        &self.classifier
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }
}

/// A tool whose every invocation passes through the gate.
///
/// Shares its name with the wrapped descriptor and implements [`Tool`], so
/// the agent runtime calls it exactly like an ungated tool.
pub struct GatedTool {
    inner: ToolDescriptor,
    gate: ToolGate,
}

impl std::fmt::Debug for GatedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedTool")
            .field("name", &self.inner.name())
            .finish()
    }
}

impl GatedTool {
    /// Current action class of the wrapped tool.
    pub fn action_class(&self) -> ActionClass {
        if safety::is_like_or_comment_publish(self.inner.as_ref()) {
            return ActionClass::PublishSocial;
        }
        self.gate.classifier.classify(self.inner.as_ref())
    }

    /// Whether the safety floor will always reject this tool.
    pub fn is_floor_denied(&self) -> bool {
        safety::is_like_or_comment_publish(self.inner.as_ref())
    }

    /// Invoke through the gate, keeping denials distinguishable from tool failures.
    pub async fn invoke(&self, params: serde_json::Value) -> Result<ToolOutput, GateError> {
        let tool_name = self.inner.name().to_string();
        let redacted = redact_sensitive_json(&params);

        if self.is_floor_denied() {
            let rule = PolicyRule::deny(ActionClass::PublishSocial, SAFETY_FLOOR_RATIONALE);
            return Err(self.reject(&tool_name, rule, redacted).await);
        }

        let action_class = self.gate.classifier.classify(self.inner.as_ref());
        let rule = self.gate.policy.evaluate(action_class).await;
        tracing::debug!(
            tool_name = %tool_name,
            action_class = %action_class,
            decision = %rule.decision,
            "Evaluated tool invocation"
        );

        match rule.decision {
            PolicyDecision::Deny => Err(self.reject(&tool_name, rule, redacted).await),
            PolicyDecision::Allow => {
                let sequence = self
                    .gate
                    .audit
                    .record(
                        AuditRecord::invocation(
                            &tool_name,
                            action_class,
                            rule.decision,
                            rule.rationale,
                            AuditOutcome::Pending,
                        )
                        .with_params(redacted),
                    )
                    .await;
                self.run(&tool_name, sequence, params, None).await
            }
            PolicyDecision::RequireConfirmation => {
                self.confirm_then_run(&tool_name, rule, params, redacted)
                    .await
            }
        }
    }

    async fn reject(&self, tool_name: &str, rule: PolicyRule, params: serde_json::Value) -> GateError {
        tracing::warn!(
            tool_name = %tool_name,
            action_class = %rule.action_class,
            rationale = %rule.rationale,
            "Tool invocation denied"
        );
        self.gate
            .audit
            .record(
                AuditRecord::invocation(
                    tool_name,
                    rule.action_class,
                    PolicyDecision::Deny,
                    rule.rationale.clone(),
                    AuditOutcome::Rejected,
                )
                .with_params(params),
            )
            .await;
        GateError::PolicyViolation {
            tool_name: tool_name.to_string(),
            action_class: rule.action_class,
            rationale: rule.rationale,
        }
    }

    async fn confirm_then_run(
        &self,
        tool_name: &str,
        rule: PolicyRule,
        params: serde_json::Value,
        redacted: serde_json::Value,
    ) -> Result<ToolOutput, GateError> {
        let audit = &self.gate.audit;
        let sequence = audit
            .record(
                AuditRecord::invocation(
                    tool_name,
                    rule.action_class,
                    rule.decision,
                    rule.rationale.clone(),
                    AuditOutcome::PendingConfirmation,
                )
                .with_params(redacted.clone()),
            )
            .await;
        let mut guard = PendingGuard::new(Arc::clone(audit), sequence, AuditOutcome::Rejected);

        let request = ConfirmationRequest {
            tool_name: tool_name.to_string(),
            action_class: rule.action_class,
            rationale: rule.rationale.clone(),
            params: redacted,
            audit_sequence: sequence,
        };
        tracing::info!(tool_name = %tool_name, sequence, "Awaiting confirmation");

        let timeout = self.gate.confirmation_timeout;
        let response = tokio::time::timeout(timeout, self.gate.confirmer.confirm(request)).await;

        match response {
            Ok(ConfirmationResponse::Granted) => {
                guard.disarm();
                tracing::info!(tool_name = %tool_name, sequence, "Confirmation granted");
                self.run(tool_name, sequence, params, Some("confirmed")).await
            }
            Ok(ConfirmationResponse::Denied { reason }) => {
                tracing::warn!(tool_name = %tool_name, reason = %reason, "Confirmation denied");
                let summary = format!("confirmation denied: {reason}");
                guard.settle(AuditOutcome::Rejected, summary.clone());
                self.finalize(sequence, AuditOutcome::Rejected, summary).await;
                guard.disarm();
                Err(GateError::PolicyViolation {
                    tool_name: tool_name.to_string(),
                    action_class: rule.action_class,
                    rationale: format!("{}; confirmation denied: {reason}", rule.rationale),
                })
            }
            Err(_) => {
                tracing::warn!(tool_name = %tool_name, ?timeout, "Confirmation timed out");
                let summary = format!("confirmation timed out after {}s", timeout.as_secs());
                guard.settle(AuditOutcome::Rejected, summary.clone());
                self.finalize(sequence, AuditOutcome::Rejected, summary).await;
                guard.disarm();
                Err(GateError::ConfirmationTimeout {
                    tool_name: tool_name.to_string(),
                    action_class: rule.action_class,
                    timeout,
                })
            }
        }
    }

    async fn run(
        &self,
        tool_name: &str,
        sequence: u64,
        params: serde_json::Value,
        note: Option<&str>,
    ) -> Result<ToolOutput, GateError> {
        let mut guard = PendingGuard::new(
            Arc::clone(&self.gate.audit),
            sequence,
            AuditOutcome::Errored,
        );
        let result = self.inner.execute(params).await;

        let prefix = note.map(|n| format!("{n}; ")).unwrap_or_default();
        let (outcome, summary) = match &result {
            Ok(output) => {
                tracing::info!(tool_name = %tool_name, sequence, "Tool invoked");
                (AuditOutcome::Invoked, format!("{prefix}{}", output.summary()))
            }
            Err(e) => {
                tracing::warn!(tool_name = %tool_name, sequence, error = %e, "Tool failed");
                (AuditOutcome::Errored, format!("{prefix}{e}"))
            }
        };
        guard.settle(outcome, summary.clone());
        self.finalize(sequence, outcome, summary).await;
        guard.disarm();
        result.map_err(GateError::Tool)
    }

    async fn finalize(&self, sequence: u64, outcome: AuditOutcome, summary: String) {
        if let Err(e) = self
            .gate
            .audit
            .finalize(sequence, outcome, Some(summary))
            .await
        {
            tracing::error!(sequence, error = %e, "Failed to finalize audit record");
        }
    }
}

#[async_trait]
impl Tool for GatedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.invoke(params).await.map_err(|e| match e {
            GateError::Tool(inner) => inner,
            denial => ToolError::NotAuthorized(denial.to_string()),
        })
    }
}

/// Finalizes a pending record if the invocation future is dropped before
/// its own finalize completes.
///
/// Disarmed only once the record is terminal. Until then a drop finalizes
/// with the settled outcome, or with `outcome` and "invocation cancelled" if
/// nothing was settled.
struct PendingGuard {
    audit: Arc<AuditLog>,
    sequence: u64,
    outcome: AuditOutcome,
    summary: String,
    armed: bool,
}

impl PendingGuard {
    fn new(audit: Arc<AuditLog>, sequence: u64, outcome: AuditOutcome) -> Self {
        Self {
            audit,
            sequence,
            outcome,
            summary: "invocation cancelled".to_string(),
            armed: true,
        }
    }

    /// Record the outcome reached, in case the finalize itself is dropped.
    fn settle(&mut self, outcome: AuditOutcome, summary: String) {
        self.outcome = outcome;
        self.summary = summary;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(sequence = self.sequence, "Invocation dropped outside a runtime");
            return;
        };
        let audit = Arc::clone(&self.audit);
        let sequence = self.sequence;
        let outcome = self.outcome;
        let summary = std::mem::take(&mut self.summary);
        handle.spawn(async move {
            // Already terminal if the interrupted finalize got through.
            let _ = audit.finalize(sequence, outcome, Some(summary)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::gate::confirm::ChannelConfirmer;
    use crate::testing::StubTool;

    fn gate() -> ToolGate {
        let audit = Arc::new(AuditLog::new());
        let policy = Arc::new(PolicyEngine::new(Arc::clone(&audit)));
        let classifier = Arc::new(ActionClassifier::with_defaults().unwrap());
        ToolGate::without_confirmation(classifier, policy, audit)
    }

    #[tokio::test]
    async fn test_allow_path_records_invoked() {
        let gate = gate();
        let stub = Arc::new(StubTool::new("get_weather"));
        let gated = gate.wrap(stub.clone());

        let out = gated.invoke(serde_json::json!({"city": "Paris"})).await.unwrap();
        assert_eq!(out.result["city"], "Paris");
        assert_eq!(stub.calls(), 1);

        let records = gate.audit().query(&AuditFilter::default()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, AuditOutcome::Invoked);
        assert_eq!(records[0].decision, PolicyDecision::Allow);
        assert_eq!(records[0].rationale, "no rule defined");
    }

    #[tokio::test]
    async fn test_underlying_error_propagates_unchanged() {
        let gate = gate();
        let stub = Arc::new(StubTool::new("get_weather"));
        stub.set_failing(true);
        let gated = gate.wrap(stub.clone());

        let err = gated.invoke(serde_json::json!({})).await.unwrap_err();
        match err {
            GateError::Tool(inner) => assert_eq!(inner, StubTool::failure()),
            other => panic!("expected tool error, got {other:?}"),
        }
        let records = gate.audit().query(&AuditFilter::default()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, AuditOutcome::Errored);
    }

    #[tokio::test]
    async fn test_tool_trait_maps_denial_to_not_authorized() {
        let gate = gate();
        let gated = gate.wrap(Arc::new(StubTool::new("like_post")));
        let err = Tool::execute(&gated, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAuthorized(msg) if msg.contains("like/comment")));
    }

    #[tokio::test]
    async fn test_params_are_redacted_in_audit() {
        let gate = gate();
        let gated = gate.wrap(Arc::new(StubTool::new("fetch_news")));
        gated
            .invoke(serde_json::json!({"query": "rust", "api_key": "sk-live"}))
            .await
            .unwrap();
        let record = gate.audit().get(0).await.unwrap();
        let params = record.params.unwrap();
        assert_eq!(params["api_key"], "[REDACTED]");
        assert_eq!(params["query"], "rust");
    }

    #[tokio::test]
    async fn test_granted_confirmation_invokes_once() {
        let (confirmer, mut rx) = ChannelConfirmer::new(4);
        let gate = gate().with_confirmer(Arc::new(confirmer));
        gate.policy()
            .set_rule(
                PolicyRule::require_confirmation(ActionClass::Communication, "ask first"),
                "test",
            )
            .await;
        tokio::spawn(async move {
            while let Some(prompt) = rx.recv().await {
                prompt.grant();
            }
        });

        let stub = Arc::new(StubTool::new("gmail_tool"));
        let gated = gate.wrap(stub.clone());
        gated.invoke(serde_json::json!({"to": "x"})).await.unwrap();
        assert_eq!(stub.calls(), 1);

        let invocations = gate
            .audit()
            .query(&AuditFilter::new().tool("gmail_tool"))
            .await;
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].decision, PolicyDecision::RequireConfirmation);
        assert_eq!(invocations[0].outcome, AuditOutcome::Invoked);
        assert!(invocations[0].summary.as_deref().unwrap().starts_with("confirmed"));
    }

    #[tokio::test]
    async fn test_confirmation_timeout_denies() {
        let (confirmer, _rx) = ChannelConfirmer::new(4);
        let gate = gate()
            .with_confirmer(Arc::new(confirmer))
            .with_confirmation_timeout(Duration::from_millis(20));
        gate.policy()
            .set_rule(
                PolicyRule::require_confirmation(ActionClass::Scheduling, "ask first"),
                "test",
            )
            .await;

        let stub = Arc::new(StubTool::new("calendar_tool"));
        let err = gate.wrap(stub.clone()).invoke(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, GateError::ConfirmationTimeout { .. }));
        assert_eq!(stub.calls(), 0);

        let records = gate
            .audit()
            .query(&AuditFilter::new().tool("calendar_tool"))
            .await;
        assert_eq!(records[0].outcome, AuditOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_dropped_invocation_is_finalized() {
        let (confirmer, mut rx) = ChannelConfirmer::new(4);
        let gate = gate().with_confirmer(Arc::new(confirmer));
        gate.policy()
            .set_rule(
                PolicyRule::require_confirmation(ActionClass::Read, "ask first"),
                "test",
            )
            .await;
        let gated = Arc::new(gate.wrap(Arc::new(StubTool::new("get_weather"))));

        let task = {
            let gated = Arc::clone(&gated);
            tokio::spawn(async move { gated.invoke(serde_json::json!({})).await })
        };
        // Hold the prompt so the invocation stays suspended, then abort it.
        let _prompt = rx.recv().await.unwrap();
        task.abort();
        let _ = task.await;

        let mut outcome = AuditOutcome::PendingConfirmation;
        for _ in 0..50 {
            let records = gate
                .audit()
                .query(&AuditFilter::new().tool("get_weather"))
                .await;
            outcome = records[0].outcome;
            if outcome.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(outcome, AuditOutcome::Rejected);
    }

    #[tokio::test]
    async fn test_invocation_dropped_while_finalizing_is_finalized() {
        let gate = gate();
        let stub = Arc::new(StubTool::new("get_weather").with_delay(Duration::from_millis(50)));
        let gated = Arc::new(gate.wrap(stub.clone()));

        let task = {
            let gated = Arc::clone(&gated);
            tokio::spawn(async move { gated.invoke(serde_json::json!({})).await })
        };
        while stub.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        // Block the log so the invocation stalls in finalize once the tool returns.
        let held = gate.audit().write_lock().await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        task.abort();
        let _ = task.await;
        drop(held);

        let mut record = None;
        for _ in 0..50 {
            let current = gate.audit().get(0).await.unwrap();
            if current.outcome.is_terminal() {
                record = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let record = record.expect("record finalized after the drop");
        assert_eq!(record.outcome, AuditOutcome::Invoked);
        assert_ne!(record.summary.as_deref(), Some("invocation cancelled"));
    }
}
