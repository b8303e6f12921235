//! Method router.

use super::content::{failed, marshal};
use super::error::McpError;
use super::protocol::{
    methods, Capabilities, ContentBlock, InitializeParams, InitializeResult, PromptGetParams,
    PromptGetResult, PromptMessage, Request, ResourceReadParams, ResourceReadResult, Response,
    ServerInfo, ToolCallParams, ToolCallResult,
};
use super::registry::{McpRegistry, RequestContext};
use crate::audit::{duration_ms, AuditEvent, Auditor, MAX_AUDITED_PARAM_BYTES};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Dispatch core: owns the registries and routes built-in methods.
pub struct McpServer {
    info: ServerInfo,
    registry: Arc<McpRegistry>,
    initialized: AtomicBool,
    auditor: Auditor,
}

impl McpServer {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            registry: Arc::new(McpRegistry::new()),
            initialized: AtomicBool::new(false),
            auditor: Auditor::tracing(false),
        }
    }

    /// Route `tool_call` audit events through this auditor.
    pub fn with_auditor(mut self, auditor: Auditor) -> Self {
        self.auditor = auditor;
        self
    }

    pub fn registry(&self) -> &McpRegistry {
        &self.registry
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Handle one request. Always returns a response carrying the request id.
    pub async fn handle_request(&self, ctx: RequestContext, request: Request) -> Response {
        match self.dispatch(&ctx, &request).await {
            Ok(result) => Response::success(request.id, result),
            Err(err) => {
                tracing::debug!(
                    request_id = %request.id,
                    method = %request.method,
                    error = %err,
                    "Request failed"
                );
                Response::error(request.id, &err)
            }
        }
    }

    async fn dispatch(&self, ctx: &RequestContext, request: &Request) -> Result<Value, McpError> {
        let method = request.method.as_str();
        match method {
            methods::INITIALIZE => self.initialize(&request.params),
            methods::INITIALIZED => Ok(json!({})),
            methods::TOOLS_LIST => to_result(json!({ "tools": self.registry.list_tools() })),
            methods::TOOLS_CALL => {
                let params: ToolCallParams = parse_params(method, &request.params)?;
                let result = self.call_tool(ctx, params).await?;
                to_result(result)
            }
            methods::PROMPTS_LIST => to_result(json!({ "prompts": self.registry.list_prompts() })),
            methods::PROMPTS_GET => self.get_prompt(&request.params),
            methods::RESOURCES_LIST => {
                to_result(json!({ "resources": self.registry.list_resources() }))
            }
            methods::RESOURCES_READ => self.read_resource(&request.params),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: &Value) -> Result<Value, McpError> {
        let params: InitializeParams = parse_params(methods::INITIALIZE, params)?;
        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            "Client initialized"
        );
        to_result(InitializeResult {
            server_info: self.info.clone(),
            capabilities: Capabilities {
                tools: true,
                prompts: true,
                resources: true,
            },
        })
    }

    /// Invoke a tool. Handler errors come back as an `is_error` result; a
    /// panicking handler is logged and reported the same way.
    pub async fn call_tool(
        &self,
        ctx: &RequestContext,
        params: ToolCallParams,
    ) -> Result<ToolCallResult, McpError> {
        let tool = self
            .registry
            .tool(&params.name)
            .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

        let param_size = serde_json::to_vec(&params.arguments).map_or(0, |b| b.len());
        let started = Instant::now();
        let future = (tool.handler)(ctx.clone(), params.arguments);

        let result = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(outcome) => marshal(outcome),
            Err(_) => {
                tracing::error!(tool = %tool.name, request_id = %ctx.request_id, "Tool handler panicked");
                failed(format!("tool '{}' failed unexpectedly", tool.name))
            }
        };

        let elapsed = started.elapsed();
        tracing::debug!(
            tool = %tool.name,
            request_id = %ctx.request_id,
            duration_ms = duration_ms(elapsed),
            is_error = result.is_error,
            "Tool call finished"
        );
        self.auditor.emit(AuditEvent::ToolCall {
            tool_name: tool.name,
            request_id: ctx.request_id.clone(),
            client_ip: ctx.client_ip.clone(),
            duration_ms: duration_ms(elapsed),
            param_size,
            truncated: param_size > MAX_AUDITED_PARAM_BYTES,
        });

        Ok(result)
    }

    fn get_prompt(&self, params: &Value) -> Result<Value, McpError> {
        let params: PromptGetParams = parse_params(methods::PROMPTS_GET, params)?;
        let prompt = self
            .registry
            .prompt(&params.name)
            .ok_or_else(|| McpError::PromptNotFound(params.name.clone()))?;

        if let Some(missing) = prompt
            .arguments
            .iter()
            .find(|a| a.required && !params.arguments.contains_key(&a.name))
        {
            return Err(McpError::invalid_params(
                methods::PROMPTS_GET,
                format!("missing required argument '{}'", missing.name),
            ));
        }

        let text = match &prompt.template {
            Some(template) => render_template(template, &params.arguments),
            None => format!("Prompt: {}", prompt.name),
        };
        to_result(PromptGetResult {
            description: prompt.description,
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: ContentBlock::text(text),
            }],
        })
    }

    fn read_resource(&self, params: &Value) -> Result<Value, McpError> {
        let params: ResourceReadParams = parse_params(methods::RESOURCES_READ, params)?;
        let resource = self
            .registry
            .resource(&params.uri)
            .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;

        let text = match (&resource.body, &resource.description) {
            (Some(body), _) => body.clone(),
            (None, Some(desc)) => format!("{}: {}", resource.name, desc),
            (None, None) => resource.name.clone(),
        };
        to_result(ResourceReadResult {
            uri: resource.uri,
            name: resource.name,
            mime_type: resource.mime_type,
            contents: vec![ContentBlock::text(text)],
        })
    }
}

fn parse_params<T: DeserializeOwned>(method: &str, params: &Value) -> Result<T, McpError> {
    T::deserialize(params).map_err(|e| McpError::invalid_params(method, e))
}

fn to_result<T: Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::Internal(e.to_string()))
}

/// Replace `{name}` placeholders with argument values. Missing optional
/// arguments render as `all namespaces` for `namespace` and empty otherwise.
fn render_template(template: &str, args: &serde_json::Map<String, Value>) -> String {
    let mut out = template.to_string();
    let mut start = 0;
    while let Some(open) = out[start..].find('{').map(|i| i + start) {
        let Some(close) = out[open..].find('}').map(|i| i + open) else {
            break;
        };
        let key = &out[open + 1..close];
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            start = open + 1;
            continue;
        }
        let value = match args.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None if key == "namespace" => "all namespaces".to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        out.replace_range(open..=close, &value);
        start = open + value.len();
    }
    out
}
