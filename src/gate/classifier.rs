//! Action classification.
//!
//! Maps a tool's name and description onto a coarse [`ActionClass`] through an
//! ordered list of regex rules. Rules are evaluated in priority order and the
//! last match wins, so specific overrides sit after general patterns.
//! Anything unmatched is [`ActionClass::Read`], the least privileged class.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::tools::Tool;

/// A coarse category of effect used for policy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionClass {
    Read,
    Publish,
    PublishSocial,
    FinancialTransaction,
    Communication,
    Scheduling,
    RecommendationControl,
}

impl ActionClass {
    pub const ALL: [ActionClass; 7] = [
        ActionClass::Read,
        ActionClass::Publish,
        ActionClass::PublishSocial,
        ActionClass::FinancialTransaction,
        ActionClass::Communication,
        ActionClass::Scheduling,
        ActionClass::RecommendationControl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::Read => "READ",
            ActionClass::Publish => "PUBLISH",
            ActionClass::PublishSocial => "PUBLISH_SOCIAL",
            ActionClass::FinancialTransaction => "FINANCIAL_TRANSACTION",
            ActionClass::Communication => "COMMUNICATION",
            ActionClass::Scheduling => "SCHEDULING",
            ActionClass::RecommendationControl => "RECOMMENDATION_CONTROL",
        }
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        ActionClass::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown action class '{s}'"))
    }
}

/// Which descriptor field a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTarget {
    Name,
    Description,
    #[default]
    Any,
}

/// One pattern-to-class mapping, uncompiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub pattern: String,
    pub class: ActionClass,
    #[serde(default)]
    pub target: MatchTarget,
}

impl ClassificationRule {
    pub fn name(pattern: impl Into<String>, class: ActionClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
            target: MatchTarget::Name,
        }
    }

    pub fn any(pattern: impl Into<String>, class: ActionClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
            target: MatchTarget::Any,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    class: ActionClass,
    target: MatchTarget,
}

impl CompiledRule {
    /// `snake_name` is `name` re-joined from its words, so camelCase names
    /// match the snake_case patterns too.
    fn matches(&self, name: &str, snake_name: &str, description: &str) -> bool {
        let name_matches = || self.regex.is_match(name) || self.regex.is_match(snake_name);
        match self.target {
            MatchTarget::Name => name_matches(),
            MatchTarget::Description => self.regex.is_match(description),
            MatchTarget::Any => name_matches() || self.regex.is_match(description),
        }
    }
}

/// Lowercased words of an identifier, split on separators and case changes.
///
/// `likePost` -> `["like", "post"]`, `HTTPRequest_v2` -> `["http", "request", "v2"]`.
pub(crate) fn identifier_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if !prev.is_ascii_uppercase() || next_is_lower {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Default rules, general first and specific overrides last.
///
/// Name patterns treat `_`, `-` and string edges as word boundaries since tool
/// names are snake_case (`\b` does not split on underscores).
pub fn default_rules() -> Vec<ClassificationRule> {
    use ActionClass::*;

    vec![
        ClassificationRule::name(
            r"(^|[_-])(post|publish|create|upload|share|submit|pin|tweet)([_-]|$)",
            Publish,
        ),
        ClassificationRule::name(r"(^|[_-])(email|gmail|mail|message|sms|send|notify)([_-]|$)", Communication),
        ClassificationRule::name(r"(^|[_-])(calendar|calendly|schedule|meeting|event|events|booking)([_-]|$)", Scheduling),
        ClassificationRule::name(r"(^|[_-])(stripe|payment|payments|charge|refund|invoice|payout|transfer)([_-]|$)", FinancialTransaction),
        ClassificationRule {
            pattern: r"\b(payment|charge a card|refund|invoice)\b".to_string(),
            class: FinancialTransaction,
            target: MatchTarget::Description,
        },
        ClassificationRule::name(r"(^|[_-])(retweet|repost|follow|react|reply)([_-]|$)", PublishSocial),
        ClassificationRule::name(r"(^|[_-])(recommendation|weights)([_-]|$)", RecommendationControl),
        ClassificationRule::name(r"^(boost_creator|demote_creator|block_tag|unblock_tag)$", RecommendationControl),
        ClassificationRule::name(r"(^|[_-])(like|likes|unlike|comment|comments|upvote|upvotes|favorite|favourite|fave)([_-]|$)",
            PublishSocial),
    ]
}

/// Derives an [`ActionClass`] from a tool descriptor.
///
/// Construction compiles every pattern and fails fast on malformed input;
/// classification itself is pure and infallible.
#[derive(Debug, Clone)]
pub struct ActionClassifier {
    rules: Vec<CompiledRule>,
    fallback: ActionClass,
}

impl ActionClassifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Result<Self, ClassifierError> {
        let compiled = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| {
                if rule.pattern.trim().is_empty() {
                    return Err(ClassifierError::EmptyPattern { index });
                }
                let regex = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ClassifierError::InvalidPattern {
                        index,
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(CompiledRule {
                    regex,
                    class: rule.class,
                    target: rule.target,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules: compiled,
            fallback: ActionClass::Read,
        })
    }

    /// Classifier over [`default_rules`].
    pub fn with_defaults() -> Result<Self, ClassifierError> {
        Self::new(default_rules())
    }

    /// Default rules followed by operator rules, which therefore take priority.
    pub fn with_overrides(overrides: Vec<ClassificationRule>) -> Result<Self, ClassifierError> {
        let mut rules = default_rules();
        rules.extend(overrides);
        Self::new(rules)
    }

    pub fn classify(&self, tool: &dyn Tool) -> ActionClass {
        self.classify_parts(tool.name(), tool.description())
    }

    pub fn classify_parts(&self, name: &str, description: &str) -> ActionClass {
        let snake_name = identifier_words(name).join("_");
        self.rules
            .iter()
            .rev()
            .find(|r| r.matches(name, &snake_name, description))
            .map(|r| r.class)
            .unwrap_or(self.fallback)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
