//! Policy-gated external tools for agent runtimes.
//!
//! Every tool call an agent makes passes through a [`gate::ToolGate`]:
//!
//! 1. a non-overridable safety floor rejects like/comment publishing,
//! 2. the [`gate::ActionClassifier`] maps the tool onto an [`gate::ActionClass`],
//! 3. the [`gate::PolicyEngine`] allows, denies or asks for confirmation,
//! 4. the [`audit::AuditLog`] records the decision and its outcome.
//!
//! The [`tools`] module supplies the generic HTTP tool and the catalog of
//! integrations it is instantiated for; [`session`] wires everything from a
//! [`config::Config`].

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod session;
pub mod testing;
pub mod tools;

pub use error::{AuditError, ClassifierError, ConfigError, GateError, RegistryError};
