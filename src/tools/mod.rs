//! Tools the agent can call and the catalog of external integrations.
//!
//! Every integration is an [`ExternalTool`] built from an
//! [`ExternalToolSpec`]. A [`Toolset`] holds validated but ungated descriptors;
//! the [`ToolRegistry`] built from it only ever hands out gated tools.

pub mod catalog;
pub mod external;
pub mod redaction;

mod registry;
mod tool;

pub use catalog::{CATALOG_NAMES, catalog_specs, catalog_tools};
pub use external::{Auth, ExternalTool, ExternalToolSpec, HttpMethod, ParamStyle, ResponseMapper};
pub use registry::{ToolRegistry, Toolset};
pub use tool::{
    Tool, ToolDescriptor, ToolError, ToolOutput, ToolSchema, require_param, require_str,
    validate_tool_schema,
};
