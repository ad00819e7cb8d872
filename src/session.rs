//! Wiring of a gated toolset from configuration.
//!
//! A [`SessionTemplate`] holds what one configuration always produces: the
//! compiled classifier, the policy-file seed rules and the validated catalog.
//! Templates are cached per fingerprint. Everything with session state (the
//! audit log and its sinks, the policy engine, the confirmer) is built fresh
//! for each [`Session`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::audit::{AuditLog, JsonlSink, TracingSink};
use crate::config::Config;
use crate::error::{ConfigError, RegistryError};
use crate::gate::{ActionClassifier, Confirmer, PolicyEngine, PolicyRule, ToolGate};
use crate::tools::{ToolRegistry, Toolset};

/// Actor recorded for rules seeded from the policy file.
pub const POLICY_FILE_ACTOR: &str = "policy-file";

/// Everything an agent runtime needs for one session.
pub struct Session {
    pub gate: ToolGate,
    pub registry: ToolRegistry,
    pub template: Arc<SessionTemplate>,
}

impl Session {
    pub fn audit(&self) -> &Arc<AuditLog> {
        self.gate.audit()
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        self.gate.policy()
    }
}

/// Session-independent parts of a configuration.
#[derive(Debug)]
pub struct SessionTemplate {
    classifier: Arc<ActionClassifier>,
    seed_rules: Vec<PolicyRule>,
    toolset: Toolset,
}

impl SessionTemplate {
    /// Load the policy file, compile the classifier and validate the catalog.
    ///
    /// Opens no sinks and writes no audit records.
    pub fn build(config: &Config) -> Result<Self, RegistryError> {
        let policy_file = config.policy_file()?.unwrap_or_default();
        let classifier = Arc::new(ActionClassifier::with_overrides(
            policy_file.classification.clone(),
        )?);
        Ok(Self {
            classifier,
            seed_rules: policy_file.policy_rules(),
            toolset: Toolset::from_catalog(&config.integrations)?,
        })
    }

    pub fn classifier(&self) -> &Arc<ActionClassifier> {
        &self.classifier
    }

    pub fn seed_rules(&self) -> &[PolicyRule] {
        &self.seed_rules
    }

    pub fn toolset(&self) -> &Toolset {
        &self.toolset
    }
}

/// Memoizes one [`SessionTemplate`] per configuration fingerprint.
#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<String, Arc<SessionTemplate>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, fingerprint: &str) -> Option<Arc<SessionTemplate>> {
        self.entries.read().await.get(fingerprint).cloned()
    }

    /// Cached template for `fingerprint`, building it on first use.
    ///
    /// Concurrent callers with the same fingerprint build it once. A failed
    /// build is not cached.
    pub async fn get_or_build<F>(
        &self,
        fingerprint: &str,
        build: F,
    ) -> Result<Arc<SessionTemplate>, RegistryError>
    where
        F: FnOnce() -> Result<SessionTemplate, RegistryError>,
    {
        if let Some(hit) = self.entries.read().await.get(fingerprint) {
            return Ok(Arc::clone(hit));
        }

        let mut entries = self.entries.write().await;
        if let Some(hit) = entries.get(fingerprint) {
            return Ok(Arc::clone(hit));
        }
        let template = Arc::new(build()?);
        tracing::debug!(fingerprint, tools = template.toolset.len(), "Cached session template");
        entries.insert(fingerprint.to_string(), Arc::clone(&template));
        Ok(template)
    }

    pub async fn invalidate(&self, fingerprint: &str) -> bool {
        self.entries.write().await.remove(fingerprint).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Open a fresh audit log and policy engine around `classifier`.
async fn open_gate(
    config: &Config,
    classifier: Arc<ActionClassifier>,
    seed_rules: Vec<PolicyRule>,
    confirmer: Arc<dyn Confirmer>,
) -> Result<ToolGate, RegistryError> {
    let mut audit = AuditLog::new();
    if config.gate.audit_tracing {
        audit = audit.with_sink(Arc::new(TracingSink));
    }
    if let Some(path) = &config.gate.audit_jsonl {
        let sink = JsonlSink::open(path).await.map_err(ConfigError::from)?;
        tracing::info!(path = %path.display(), "Forwarding audit records to JSONL");
        audit = audit.with_sink(Arc::new(sink));
    }
    let audit = Arc::new(audit);

    let seeded = seed_rules.len();
    let policy = Arc::new(PolicyEngine::new(Arc::clone(&audit)));
    policy.load(seed_rules, POLICY_FILE_ACTOR).await;

    tracing::info!(
        classification_rules = classifier.rule_count(),
        policy_rules = seeded,
        confirmation_timeout_secs = config.gate.confirmation_timeout_secs,
        "Tool gate ready"
    );

    Ok(ToolGate::new(
        classifier,
        policy,
        audit,
        confirmer,
        config.gate.confirmation_timeout(),
    ))
}

/// Build the gate: audit sinks, seeded policy and classifier overrides.
pub async fn build_gate(
    config: &Config,
    confirmer: Arc<dyn Confirmer>,
) -> Result<ToolGate, RegistryError> {
    let policy_file = config.policy_file()?.unwrap_or_default();
    let classifier = Arc::new(ActionClassifier::with_overrides(
        policy_file.classification.clone(),
    )?);
    open_gate(config, classifier, policy_file.policy_rules(), confirmer).await
}

/// Build a session with its own gate, reusing the cached template for an
/// identical configuration.
pub async fn build_session(
    config: &Config,
    confirmer: Arc<dyn Confirmer>,
    cache: &SessionCache,
) -> Result<Session, RegistryError> {
    let template = cache
        .get_or_build(&config.fingerprint(), || SessionTemplate::build(config))
        .await?;
    let gate = open_gate(
        config,
        Arc::clone(&template.classifier),
        template.seed_rules.clone(),
        confirmer,
    )
    .await?;
    let registry = ToolRegistry::from_toolset(&template.toolset, gate.clone());
    Ok(Session {
        gate,
        registry,
        template,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::audit::{AuditFilter, AuditKind};
    use crate::gate::{
        ActionClass, ConfirmationRequest, ConfirmationResponse, DenyAllConfirmer, PolicyDecision,
    };

    #[tokio::test]
    async fn test_policy_file_seeds_rules_and_classification() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = dir.path().join("policy.toml");
        std::fs::write(
            &policy_path,
            r#"
[[rules]]
class = "FINANCIAL_TRANSACTION"
decision = "deny"
rationale = "payments disabled"

[[classification]]
pattern = "^random_quote$"
class = "PUBLISH"
target = "name"
"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.gate.policy_file = Some(policy_path);
        config.gate.audit_jsonl = Some(dir.path().join("audit/audit.jsonl"));

        let gate = build_gate(&config, Arc::new(DenyAllConfirmer)).await.unwrap();
        let rule = gate.policy().evaluate(ActionClass::FinancialTransaction).await;
        assert_eq!(rule.decision, PolicyDecision::Deny);
        assert_eq!(
            gate.classifier().classify_parts("random_quote", ""),
            ActionClass::Publish
        );

        let updates = gate
            .audit()
            .query(&AuditFilter::new().kind(AuditKind::PolicyUpdate))
            .await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].actor.as_deref(), Some(POLICY_FILE_ACTOR));
        assert!(dir.path().join("audit/audit.jsonl").exists());
    }

    #[tokio::test]
    async fn test_cache_memoizes_per_fingerprint() {
        let cache = SessionCache::new();
        let config = Config::default();
        let mut builds = 0;
        let first = cache
            .get_or_build("abc", || {
                builds += 1;
                SessionTemplate::build(&config)
            })
            .await
            .unwrap();
        let second = cache
            .get_or_build("abc", || {
                builds += 1;
                SessionTemplate::build(&config)
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds, 1);

        let failed = cache
            .get_or_build("def", || Err(RegistryError::Duplicate("x".to_string())))
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.len().await, 1);
        assert!(cache.invalidate("abc").await);
        assert!(cache.is_empty().await);
    }

    #[derive(Default)]
    struct CountingConfirmer {
        asked: AtomicU32,
    }

    #[async_trait]
    impl Confirmer for CountingConfirmer {
        async fn confirm(&self, _request: ConfirmationRequest) -> ConfirmationResponse {
            self.asked.fetch_add(1, Ordering::Relaxed);
            ConfirmationResponse::denied("counted")
        }
    }

    #[tokio::test]
    async fn test_cached_sessions_keep_their_own_gate() {
        let cache = SessionCache::new();
        let config = Config::default();
        let first_confirmer = Arc::new(CountingConfirmer::default());
        let second_confirmer = Arc::new(CountingConfirmer::default());

        let first = build_session(&config, first_confirmer.clone(), &cache)
            .await
            .unwrap();
        let second = build_session(&config, second_confirmer.clone(), &cache)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first.template, &second.template));
        assert_eq!(cache.len().await, 1);
        assert!(!Arc::ptr_eq(first.audit(), second.audit()));
        assert!(!Arc::ptr_eq(first.policy(), second.policy()));
        assert_eq!(first.registry.names(), second.registry.names());

        second
            .policy()
            .set_rule(
                PolicyRule::require_confirmation(ActionClass::Read, "reads need a human"),
                "ops",
            )
            .await;

        let tool = second
            .registry
            .snapshot()
            .into_iter()
            .find(|t| t.action_class() == ActionClass::Read && !t.is_floor_denied())
            .expect("a key-less read tool is always registered");
        let err = tool.invoke(serde_json::json!({})).await.unwrap_err();
        assert!(err.is_denial());

        // The second session asked its own confirmer and nobody else's.
        assert_eq!(second_confirmer.asked.load(Ordering::Relaxed), 1);
        assert_eq!(first_confirmer.asked.load(Ordering::Relaxed), 0);
        assert_eq!(
            first.policy().evaluate(ActionClass::Read).await.decision,
            PolicyDecision::Allow
        );
        assert!(first.audit().is_empty().await);
        assert_eq!(second.audit().len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_seed_their_own_audit() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = dir.path().join("policy.toml");
        std::fs::write(
            &policy_path,
            r#"
[[rules]]
class = "SCHEDULING"
decision = "deny"
rationale = "no meetings"
"#,
        )
        .unwrap();
        let jsonl = dir.path().join("audit.jsonl");

        let mut config = Config::default();
        config.gate.policy_file = Some(policy_path);
        config.gate.audit_jsonl = Some(jsonl.clone());

        let cache = SessionCache::new();
        let (first, second) = tokio::join!(
            build_session(&config, Arc::new(DenyAllConfirmer), &cache),
            build_session(&config, Arc::new(DenyAllConfirmer), &cache),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first.template, &second.template));
        assert_eq!(cache.len().await, 1);

        for session in [&first, &second] {
            let updates = session
                .audit()
                .query(&AuditFilter::new().kind(AuditKind::PolicyUpdate))
                .await;
            assert_eq!(updates.len(), 1);
            assert_eq!(
                session.policy().evaluate(ActionClass::Scheduling).await.decision,
                PolicyDecision::Deny
            );
        }
        // One seed record per live session; nothing built and thrown away.
        let written = std::fs::read_to_string(&jsonl).unwrap();
        assert_eq!(written.lines().count(), 2);
    }
}
