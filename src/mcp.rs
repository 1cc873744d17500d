//! Minimal MCP (Model Context Protocol) server interface.
//!
//! Full MCP transport (stdio/SSE process management, handshake, capability negotiation)
//! is out of scope for the session engine — callers wire up their own MCP client and hand
//! the engine only this thin [`McpServer`] trait, which the tool registry uses to proxy
//! `mcp__{server}__{tool}` names (§4.2, §6 Non-goals).

use crate::error::Result;
use crate::tools::ToolOutput;
use async_trait::async_trait;
use serde_json::Value;

/// A connected MCP server, as seen by the tool registry.
#[async_trait]
pub trait McpServer: Send + Sync {
    /// List tools this server exposes, as `(name, description, input_schema)` triples.
    async fn list_tools(&self) -> Result<Vec<(String, String, Value)>>;

    /// Invoke a remote tool by its unqualified name.
    async fn call_tool(&self, name: &str, input: Value) -> Result<ToolOutput>;

    /// Release any underlying transport resources (process handle, socket).
    async fn close(&self) -> Result<()>;
}
