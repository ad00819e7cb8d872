use std::path::PathBuf;
use std::time::Duration;

use crate::config::helpers::{optional_env, parse_bool_env, parse_optional_env};
use crate::error::ConfigError;

/// Gate behaviour resolved at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Seconds to wait for a confirmation before denying.
    pub confirmation_timeout_secs: u64,
    /// TOML file with policy and classification rules.
    pub policy_file: Option<PathBuf>,
    /// Append terminal audit records to this JSON Lines file.
    pub audit_jsonl: Option<PathBuf>,
    /// Emit terminal audit records as tracing events.
    pub audit_tracing: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: 60,
            policy_file: None,
            audit_jsonl: None,
            audit_tracing: true,
        }
    }
}

impl GateConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let confirmation_timeout_secs = parse_optional_env(
            "GATE_CONFIRMATION_TIMEOUT_SECS",
            defaults.confirmation_timeout_secs,
        )?;
        if confirmation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GATE_CONFIRMATION_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            confirmation_timeout_secs,
            policy_file: optional_env("GATE_POLICY_FILE")?.map(PathBuf::from),
            audit_jsonl: optional_env("GATE_AUDIT_JSONL")?.map(PathBuf::from),
            audit_tracing: parse_bool_env("GATE_AUDIT_TRACING", defaults.audit_tracing)?,
        })
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}
