//! Allow/deny/confirm rules keyed by action class.
//!
//! Default-allow, override-to-deny: a class with no explicit rule evaluates to
//! an implicit `Allow` rule. Rule replacement is atomic per class and takes
//! effect for every evaluation that starts after `set_rule` returns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::audit::{AuditLog, AuditRecord};
use crate::gate::ActionClass;

/// Rationale attached to the implicit default rule.
pub const NO_RULE_RATIONALE: &str = "no rule defined";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Deny,
    RequireConfirmation,
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::Deny => "deny",
            PolicyDecision::RequireConfirmation => "require_confirmation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub action_class: ActionClass,
    pub decision: PolicyDecision,
    pub rationale: String,
}

impl PolicyRule {
    pub fn new(
        action_class: ActionClass,
        decision: PolicyDecision,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            action_class,
            decision,
            rationale: rationale.into(),
        }
    }

    pub fn allow(action_class: ActionClass, rationale: impl Into<String>) -> Self {
        Self::new(action_class, PolicyDecision::Allow, rationale)
    }

    pub fn deny(action_class: ActionClass, rationale: impl Into<String>) -> Self {
        Self::new(action_class, PolicyDecision::Deny, rationale)
    }

    pub fn require_confirmation(action_class: ActionClass, rationale: impl Into<String>) -> Self {
        Self::new(action_class, PolicyDecision::RequireConfirmation, rationale)
    }

    /// The rule in effect for a class nobody configured.
    pub fn implicit(action_class: ActionClass) -> Self {
        Self::allow(action_class, NO_RULE_RATIONALE)
    }
}

/// Holds at most one active rule per action class.
pub struct PolicyEngine {
    rules: RwLock<BTreeMap<ActionClass, PolicyRule>>,
    audit: Arc<AuditLog>,
}

impl PolicyEngine {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
            audit,
        }
    }

    /// Seed initial rules at session start. Later entries for the same class win.
    ///
    /// Each seeded rule is audited like any other update.
    pub async fn load(&self, rules: impl IntoIterator<Item = PolicyRule>, actor: &str) {
        for rule in rules {
            self.set_rule(rule, actor).await;
        }
    }

    pub async fn evaluate(&self, action_class: ActionClass) -> PolicyRule {
        self.rules
            .read()
            .await
            .get(&action_class)
            .cloned()
            .unwrap_or_else(|| PolicyRule::implicit(action_class))
    }

    /// Replace any existing rule for the rule's class.
    ///
    /// The update is appended to the audit log before the rules lock is
    /// released, so no decision made under the new rule precedes its record.
    /// Returns the rule it replaced, if any.
    pub async fn set_rule(&self, rule: PolicyRule, actor: &str) -> Option<PolicyRule> {
        let record = AuditRecord::policy_update(
            rule.action_class,
            rule.decision,
            rule.rationale.clone(),
            actor,
        );
        let mut rules = self.rules.write().await;
        let previous = rules.insert(rule.action_class, rule.clone());
        self.audit.record(record).await;
        drop(rules);

        tracing::info!(
            action_class = %rule.action_class,
            decision = %rule.decision,
            actor,
            "Policy rule updated"
        );
        previous
    }

    /// Drop the explicit rule for a class, reverting it to default-allow.
    pub async fn remove_rule(&self, action_class: ActionClass, actor: &str) -> Option<PolicyRule> {
        let mut rules = self.rules.write().await;
        let previous = rules.remove(&action_class);
        if previous.is_some() {
            self.audit
                .record(AuditRecord::policy_update(
                    action_class,
                    PolicyDecision::Allow,
                    format!("rule removed; {NO_RULE_RATIONALE}"),
                    actor,
                ))
                .await;
            drop(rules);
            tracing::info!(action_class = %action_class, actor, "Policy rule removed");
        }
        previous
    }

    /// Snapshot of explicit rules, ordered by class.
    pub async fn rules(&self) -> Vec<PolicyRule> {
        self.rules.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, AuditKind};

    fn engine() -> (PolicyEngine, Arc<AuditLog>) {
        let audit = Arc::new(AuditLog::new());
        (PolicyEngine::new(Arc::clone(&audit)), audit)
    }

    #[tokio::test]
    async fn test_default_allow_for_every_class() {
        let (engine, _) = engine();
        for class in ActionClass::ALL {
            let rule = engine.evaluate(class).await;
            assert_eq!(rule.decision, PolicyDecision::Allow);
            assert_eq!(rule.rationale, NO_RULE_RATIONALE);
            assert_eq!(rule.action_class, class);
        }
    }

    #[tokio::test]
    async fn test_set_rule_last_write_wins() {
        let (engine, _) = engine();
        let class = ActionClass::FinancialTransaction;

        assert!(engine.set_rule(PolicyRule::deny(class, "freeze"), "ops").await.is_none());
        assert_eq!(engine.evaluate(class).await.decision, PolicyDecision::Deny);

        let previous = engine
            .set_rule(PolicyRule::allow(class, "thaw"), "ops")
            .await
            .unwrap();
        assert_eq!(previous.rationale, "freeze");
        assert_eq!(engine.evaluate(class).await.rationale, "thaw");
        assert_eq!(engine.rules().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rule_changes_are_audited() {
        let (engine, audit) = engine();
        engine
            .set_rule(PolicyRule::deny(ActionClass::Publish, "no posting"), "alice")
            .await;
        engine.remove_rule(ActionClass::Publish, "bob").await;
        // Removing a missing rule is a no-op.
        engine.remove_rule(ActionClass::Publish, "bob").await;

        let updates = audit
            .query(&AuditFilter::new().kind(AuditKind::PolicyUpdate))
            .await;
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].actor.as_deref(), Some("alice"));
        assert_eq!(updates[0].decision, PolicyDecision::Deny);
        assert_eq!(updates[1].actor.as_deref(), Some("bob"));
        assert_eq!(
            engine.evaluate(ActionClass::Publish).await.decision,
            PolicyDecision::Allow
        );
    }

    #[tokio::test]
    async fn test_load_seeds_rules() {
        let (engine, _) = engine();
        engine
            .load(
                vec![
                    PolicyRule::deny(ActionClass::Communication, "first"),
                    PolicyRule::require_confirmation(ActionClass::Communication, "second"),
                ],
                "config",
            )
            .await;
        let rule = engine.evaluate(ActionClass::Communication).await;
        assert_eq!(rule.decision, PolicyDecision::RequireConfirmation);
        assert_eq!(rule.rationale, "second");
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_rules() {
        let (engine, _) = engine();
        let engine = Arc::new(engine);
        let class = ActionClass::Scheduling;

        let writer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for i in 0..50 {
                    let rule = if i % 2 == 0 {
                        PolicyRule::deny(class, "deny-rule")
                    } else {
                        PolicyRule::allow(class, "allow-rule")
                    };
                    engine.set_rule(rule, "writer").await;
                }
            })
        };

        for _ in 0..200 {
            let rule = engine.evaluate(class).await;
            match rule.decision {
                PolicyDecision::Deny => assert_eq!(rule.rationale, "deny-rule"),
                PolicyDecision::Allow => assert!(
                    rule.rationale == "allow-rule" || rule.rationale == NO_RULE_RATIONALE
                ),
                PolicyDecision::RequireConfirmation => unreachable!(),
            }
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_new_rule_not_visible_before_its_record() {
        let (engine, audit) = engine();
        let engine = Arc::new(engine);
        let class = ActionClass::Read;

        let held = audit.write_lock().await;
        let writer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .set_rule(PolicyRule::deny(class, "read freeze"), "ops")
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // The record is stuck behind the held log, so the rule must be too.
        let early =
            tokio::time::timeout(std::time::Duration::from_millis(20), engine.evaluate(class))
                .await;
        assert!(early.is_err());

        drop(held);
        writer.await.unwrap();
        assert_eq!(audit.len().await, 1);
        assert_eq!(engine.evaluate(class).await.decision, PolicyDecision::Deny);
    }
}
