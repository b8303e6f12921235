//! # Dispatch core
//!
//! Request routing for the `/mcp` endpoint: the tool, prompt and resource
//! registries, the built-in method table and content marshaling.
//!
//! ```
//! use pdb_advisor::mcp::{McpServer, Request, RequestContext, ServerInfo, ToolBuilder, ToolOutput};
//! use serde_json::json;
//!
//! # async fn example() {
//! let server = McpServer::new(ServerInfo::default());
//! server
//!     .registry()
//!     .register_tool(
//!         ToolBuilder::new("ping").build(|_ctx, _params| async { Ok(ToolOutput::text("pong")) }),
//!     )
//!     .unwrap();
//!
//! let response = server
//!     .handle_request(
//!         RequestContext::default(),
//!         Request::new("1", "tools/call", json!({"name": "ping"})),
//!     )
//!     .await;
//! assert_eq!(response.id, "1");
//! # }
//! ```

pub mod content;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;

pub use content::ToolOutput;
pub use error::{McpError, RegistryError, ToolError};
pub use protocol::{
    ContentBlock, ErrorBody, Notification, Request, Response, ServerInfo, ToolCallResult,
};
pub use registry::{
    McpRegistry, RegisteredPrompt, RegisteredResource, RegisteredTool, RequestContext,
    ToolBuilder, ToolResult,
};
pub use server::McpServer;
