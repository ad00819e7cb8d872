//! Ordered collection of gated tools handed to the agent runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::IntegrationsConfig;
use crate::error::RegistryError;
use crate::gate::{GatedTool, ToolGate};
use crate::tools::catalog::catalog_tools;
use crate::tools::{Tool, ToolDescriptor, validate_tool_schema};

/// Registered tools, every one already wrapped by the gate.
///
/// No ungated descriptor is ever reachable through the registry.
pub struct ToolRegistry {
    gate: ToolGate,
    tools: Vec<Arc<GatedTool>>,
    by_name: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Name, uniqueness and schema checks shared by [`Toolset`] and [`ToolRegistry`].
fn check_descriptor(
    descriptor: &ToolDescriptor,
    taken: impl Fn(&str) -> bool,
) -> Result<String, RegistryError> {
    let name = descriptor.name().to_string();
    if !valid_name(&name) {
        return Err(RegistryError::InvalidName(name));
    }
    if taken(&name) {
        return Err(RegistryError::Duplicate(name));
    }
    let errors = validate_tool_schema(&descriptor.parameters_schema(), &name);
    if !errors.is_empty() {
        return Err(RegistryError::InvalidSchema { name, errors });
    }
    Ok(name)
}

/// Validated raw descriptors, not yet bound to any gate.
///
/// Holds no session state, so one toolset can back any number of sessions.
/// Agents only ever see it through [`ToolRegistry::from_toolset`].
#[derive(Clone, Default)]
pub struct Toolset {
    tools: Vec<ToolDescriptor>,
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolset").field("tools", &self.names()).finish()
    }
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every configured catalog integration, sharing one HTTP client.
    pub fn from_catalog(integrations: &IntegrationsConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(integrations.http_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RegistryError::HttpClient(e.to_string()))?;

        let mut toolset = Self::new();
        for tool in catalog_tools(integrations, &client) {
            toolset.add(tool)?;
        }
        tracing::info!(count = toolset.len(), "Loaded catalog tools");
        Ok(toolset)
    }

    pub fn add(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        check_descriptor(&descriptor, |name| {
            self.tools.iter().any(|t| t.name() == name)
        })?;
        self.tools.push(descriptor);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry {
    pub fn new(gate: ToolGate) -> Self {
        Self {
            gate,
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry holding every configured catalog integration.
    pub fn from_catalog(
        integrations: &IntegrationsConfig,
        gate: ToolGate,
    ) -> Result<Self, RegistryError> {
        Ok(Self::from_toolset(&Toolset::from_catalog(integrations)?, gate))
    }

    /// Wrap an already validated toolset with `gate`.
    pub fn from_toolset(toolset: &Toolset, gate: ToolGate) -> Self {
        let mut registry = Self::new(gate);
        for descriptor in &toolset.tools {
            registry.push(Arc::clone(descriptor));
        }
        registry
    }

    /// Validate, wrap and append a raw tool.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        check_descriptor(&descriptor, |name| self.by_name.contains_key(name))?;
        self.push(descriptor);
        Ok(())
    }

    fn push(&mut self, descriptor: ToolDescriptor) {
        let gated = self.gate.wrap(descriptor);
        tracing::debug!(
            tool_name = %gated.name(),
            action_class = %gated.action_class(),
            floor_denied = gated.is_floor_denied(),
            "Registered tool"
        );
        self.by_name.insert(gated.name().to_string(), self.tools.len());
        self.tools.push(Arc::new(gated));
    }

    /// Gated tools in registration order.
    pub fn snapshot(&self) -> Vec<Arc<GatedTool>> {
        self.tools.clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<GatedTool>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn gate(&self) -> &ToolGate {
        &self.gate
    }
}
