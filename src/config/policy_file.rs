//! TOML policy file loaded at session start.
//!
//! ```toml
//! [[rules]]
//! class = "FINANCIAL_TRANSACTION"
//! decision = "deny"
//! rationale = "payments are disabled for this deployment"
//!
//! [[classification]]
//! pattern = "^send_invoice$"
//! class = "FINANCIAL_TRANSACTION"
//! target = "name"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gate::{ActionClass, ClassificationRule, PolicyDecision, PolicyRule};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub class: ActionClass,
    pub decision: PolicyDecision,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl From<PolicyEntry> for PolicyRule {
    fn from(entry: PolicyEntry) -> Self {
        let rationale = entry
            .rationale
            .unwrap_or_else(|| format!("{} by policy file", entry.decision));
        PolicyRule::new(entry.class, entry.decision, rationale)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFile {
    #[serde(default)]
    pub rules: Vec<PolicyEntry>,
    /// Operator classification rules, appended after the defaults.
    #[serde(default)]
    pub classification: Vec<ClassificationRule>,
}

impl PolicyFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|message| ConfigError::ParseError {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn policy_rules(&self) -> Vec<PolicyRule> {
        self.rules.iter().cloned().map(PolicyRule::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::MatchTarget;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[[rules]]
class = "FINANCIAL_TRANSACTION"
decision = "deny"
rationale = "payments disabled"

[[rules]]
class = "COMMUNICATION"
decision = "require_confirmation"

[[classification]]
pattern = "^send_invoice$"
class = "FINANCIAL_TRANSACTION"
target = "name"

[[classification]]
pattern = "newsletter"
class = "COMMUNICATION"
"#;

    #[test]
    fn test_parse_sample() {
        let file = PolicyFile::parse(SAMPLE).unwrap();
        assert_eq!(
            file.policy_rules(),
            vec![
                PolicyRule::deny(ActionClass::FinancialTransaction, "payments disabled"),
                PolicyRule::require_confirmation(
                    ActionClass::Communication,
                    "require_confirmation by policy file"
                ),
            ]
        );
        assert_eq!(file.classification.len(), 2);
        assert_eq!(file.classification[0].target, MatchTarget::Name);
        assert_eq!(file.classification[1].target, MatchTarget::Any);
    }

    #[test]
    fn test_unknown_class_is_an_error() {
        let err = PolicyFile::parse("[[rules]]\nclass = \"TELEPORT\"\ndecision = \"deny\"\n")
            .unwrap_err();
        assert!(err.contains("TELEPORT") || err.contains("unknown variant"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = PolicyFile::load(&path).unwrap();
        assert_eq!(file.rules.len(), 2);

        std::fs::write(&path, "rules = 3").unwrap();
        let err = PolicyFile::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_empty_file_is_valid() {
        assert_eq!(PolicyFile::parse("").unwrap(), PolicyFile::default());
    }
}
