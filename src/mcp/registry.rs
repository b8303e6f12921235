//! Tool, prompt and resource registries.
//!
//! Each registry is a [`DashMap`] keyed by name (or URI). Lookups take a
//! shard read lock, registration a shard write lock held only for the
//! duplicate check and insert. Handlers are cloned out before they run so no
//! lock is held across an await point.

use super::content::ToolOutput;
use super::error::{RegistryError, ToolError};
use super::protocol::{PromptArgument, PromptInfo, ResourceInfo, ToolInfo};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

/// Per-request metadata handed to every tool handler.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: String,
    pub client_ip: String,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, client_ip: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            client_ip: client_ip.into(),
        }
    }
}

pub type ToolResult = Result<ToolOutput, ToolError>;

pub type ToolHandler = Arc<dyn Fn(RequestContext, Value) -> BoxFuture<'static, ToolResult> + Send + Sync>;

#[derive(Clone)]
pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

impl RegisteredTool {
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Builder for a [`RegisteredTool`].
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> RegisteredTool
    where
        F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        RegisteredTool {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
        }
    }
}

/// Prompt with an optional body template. `{arg}` placeholders are replaced
/// by argument values on `prompts/get`.
#[derive(Debug, Clone)]
pub struct RegisteredPrompt {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
    pub template: Option<String>,
}

impl RegisteredPrompt {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments: Vec::new(),
            template: None,
        }
    }

    pub fn argument(mut self, name: &str, description: &str, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.to_string(),
            description: description.to_string(),
            required,
        });
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn info(&self) -> PromptInfo {
        PromptInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

/// Resource with optional static body.
#[derive(Debug, Clone)]
pub struct RegisteredResource {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub body: Option<String>,
}

impl RegisteredResource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            body: None,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// The three registries served by the dispatcher.
#[derive(Default)]
pub struct McpRegistry {
    tools: DashMap<String, RegisteredTool>,
    prompts: DashMap<String, RegisteredPrompt>,
    resources: DashMap<String, RegisteredResource>,
}

fn insert_unique<V>(
    map: &DashMap<String, V>,
    kind: &'static str,
    key: String,
    value: V,
) -> Result<(), RegistryError> {
    if key.trim().is_empty() {
        return Err(RegistryError::EmptyKey { kind });
    }
    match map.entry(key) {
        Entry::Occupied(e) => Err(RegistryError::Duplicate {
            kind,
            key: e.key().clone(),
        }),
        Entry::Vacant(e) => {
            e.insert(value);
            Ok(())
        }
    }
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool(&self, tool: RegisteredTool) -> Result<(), RegistryError> {
        tracing::debug!(tool = %tool.name, "Registering tool");
        insert_unique(&self.tools, "tool", tool.name.clone(), tool)
    }

    pub fn register_prompt(&self, prompt: RegisteredPrompt) -> Result<(), RegistryError> {
        insert_unique(&self.prompts, "prompt", prompt.name.clone(), prompt)
    }

    pub fn register_resource(&self, resource: RegisteredResource) -> Result<(), RegistryError> {
        insert_unique(&self.resources, "resource", resource.uri.clone(), resource)
    }

    /// Snapshot of a tool, cloned out of the map.
    pub fn tool(&self, name: &str) -> Option<RegisteredTool> {
        self.tools.get(name).map(|t| t.value().clone())
    }

    pub fn prompt(&self, name: &str) -> Option<RegisteredPrompt> {
        self.prompts.get(name).map(|p| p.value().clone())
    }

    pub fn resource(&self, uri: &str) -> Option<RegisteredResource> {
        self.resources.get(uri).map(|r| r.value().clone())
    }

    /// Listing order is unspecified.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| t.info()).collect()
    }

    pub fn list_prompts(&self) -> Vec<PromptInfo> {
        self.prompts.iter().map(|p| p.info()).collect()
    }

    pub fn list_resources(&self) -> Vec<ResourceInfo> {
        self.resources.iter().map(|r| r.info()).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}
