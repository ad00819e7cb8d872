//! Test helpers for exercising the gate without real integrations.
//!
//! Provides:
//! - [`StubTool`]: a configurable tool that echoes its parameters
//! - [`gate_harness`]: a gate with default classification, an empty policy
//!   and a fresh audit log
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use toolgate::testing::{StubTool, gate_harness};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = gate_harness();
//!     let gated = harness.gate.wrap(Arc::new(StubTool::new("get_weather")));
//!     gated.invoke(serde_json::json!({"city": "Paris"})).await.unwrap();
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::audit::AuditLog;
use crate::gate::{ActionClassifier, Confirmer, DenyAllConfirmer, PolicyEngine, ToolGate};
use crate::tools::{Tool, ToolError, ToolOutput};

/// A configurable tool stub.
///
/// Supports:
/// - Call counting via [`calls()`](Self::calls)
/// - Runtime failure toggling via [`set_failing()`](Self::set_failing)
/// - An artificial delay before responding
///
/// Succeeds with the parameters it was given.
pub struct StubTool {
    name: String,
    description: String,
    schema: serde_json::Value,
    delay: Option<Duration>,
    call_count: AtomicU32,
    should_fail: AtomicBool,
}

impl StubTool {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: format!("Stub tool {name}"),
            name,
            schema: serde_json::json!({"type": "object", "properties": {}}),
            delay: None,
            call_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times the underlying tool actually ran.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// The error returned while failing.
    pub fn failure() -> ToolError {
        ToolError::ExternalService("stub failure".to_string())
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Self::failure());
        }
        Ok(ToolOutput::success(params, self.delay.unwrap_or_default()))
    }
}

/// Components of a gate wired for tests.
pub struct GateHarness {
    pub gate: ToolGate,
    pub policy: Arc<PolicyEngine>,
    pub audit: Arc<AuditLog>,
}

/// Gate over the default classifier that denies all confirmations.
pub fn gate_harness() -> GateHarness {
    gate_harness_with(Arc::new(DenyAllConfirmer), Duration::from_secs(5))
}

pub fn gate_harness_with(confirmer: Arc<dyn Confirmer>, timeout: Duration) -> GateHarness {
    let audit = Arc::new(AuditLog::new());
    let policy = Arc::new(PolicyEngine::new(Arc::clone(&audit)));
    let classifier =
        Arc::new(ActionClassifier::with_defaults().expect("default classification rules compile"));
    let gate = ToolGate::new(
        classifier,
        Arc::clone(&policy),
        Arc::clone(&audit),
        confirmer,
        timeout,
    );
    GateHarness {
        gate,
        policy,
        audit,
    }
}
