//! Append-only audit trail of gated decisions.
//!
//! Every tool invocation through the gate produces exactly one record that
//! ends in a terminal outcome (`invoked`, `rejected` or `errored`). Policy
//! changes are recorded as `POLICY_UPDATE` records.

mod filter;
mod log;
mod record;
mod sink;

pub use filter::AuditFilter;
pub use log::AuditLog;
pub use record::{AuditKind, AuditOutcome, AuditRecord};
pub use sink::{AuditSink, JsonlSink, MemorySink, TracingSink};
