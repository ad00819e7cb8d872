//! Policy gate between the agent runtime and its tools.

pub mod classifier;
pub mod confirm;
#[allow(clippy::module_inception)]
pub mod gate;
pub mod policy;
pub mod safety;

pub use classifier::{ActionClass, ActionClassifier, ClassificationRule, MatchTarget, default_rules};
pub use confirm::{
    ChannelConfirmer, ConfirmationPrompt, ConfirmationRequest, ConfirmationResponse, Confirmer,
    DenyAllConfirmer,
};
pub use gate::{DEFAULT_CONFIRMATION_TIMEOUT, GatedTool, ToolGate};
pub use policy::{NO_RULE_RATIONALE, PolicyDecision, PolicyEngine, PolicyRule};
pub use safety::{SAFETY_FLOOR_RATIONALE, is_like_or_comment_publish, violates_floor};
