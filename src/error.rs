//! Error types shared across the crate.

use std::time::Duration;

use thiserror::Error;

use crate::gate::ActionClass;
use crate::tools::ToolError;

/// Configuration resolution errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while building an [`ActionClassifier`](crate::gate::ActionClassifier).
///
/// These are fatal at construction time; classification itself never fails.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classification rule {index} has an invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        reason: String,
    },

    #[error("classification rule {index} has an empty pattern")]
    EmptyPattern { index: usize },
}

/// Errors surfaced by a gated tool invocation.
#[derive(Debug, Error)]
pub enum GateError {
    /// Denied by a configured rule, a refused confirmation, or the safety floor.
    #[error("Policy violation: tool '{tool_name}' ({action_class}) denied: {rationale}")]
    PolicyViolation {
        tool_name: String,
        action_class: ActionClass,
        rationale: String,
    },

    /// A confirmation request was not answered in time. Resolves to denial.
    #[error("Confirmation for tool '{tool_name}' ({action_class}) timed out after {timeout:?}")]
    ConfirmationTimeout {
        tool_name: String,
        action_class: ActionClass,
        timeout: Duration,
    },

    /// The wrapped integration failed. Propagated unchanged.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl GateError {
    /// Human-readable reason the agent can relay when explaining a refusal.
    pub fn rationale(&self) -> String {
        match self {
            GateError::PolicyViolation { rationale, .. } => rationale.clone(),
            GateError::ConfirmationTimeout { timeout, .. } => {
                format!("confirmation not received within {}s", timeout.as_secs())
            }
            GateError::Tool(e) => e.to_string(),
        }
    }

    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            GateError::PolicyViolation { .. } | GateError::ConfirmationTimeout { .. }
        )
    }
}

/// Errors from the append-only audit log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("no audit record with sequence {0}")]
    UnknownSequence(u64),

    #[error("audit record {0} already has a terminal outcome")]
    AlreadyFinalized(u64),

    #[error("outcome '{0}' is not terminal")]
    NonTerminalOutcome(crate::audit::AuditOutcome),
}

/// Errors from registry assembly.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid tool name '{0}': use letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("tool '{name}' has an invalid input schema: {}", errors.join("; "))]
    InvalidSchema { name: String, errors: Vec<String> },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
