// SPDX-License-Identifier: MIT

//! Tools served by external MCP servers
//!
//! A server is started as a child process speaking MCP over stdio. Its tools
//! are listed once and registered in a [`ToolRegistry`] as [`McpTool`]s.

mod client;
mod tool;

pub use client::StdioSession;
pub use tool::McpTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::adk::error::ToolError;
use crate::kinetic::workflow::registry::ToolRegistry;

/// How to launch an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the server process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl McpServerConfig {
    /// AMap maps server (weather, geocoding, routes, POI search)
    pub fn amap(api_key: impl Into<String>) -> Self {
        Self {
            name: "amap".to_string(),
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "@amap/amap-maps-mcp-server".to_string()],
            env: HashMap::from([("AMAP_MAPS_API_KEY".to_string(), api_key.into())]),
        }
    }
}

/// Tool description as advertised by a server
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Result of one remote tool call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteCallResult {
    /// Text content blocks in order
    pub texts: Vec<String>,
    pub structured: Option<Value>,
    /// The server reported a tool-level failure
    pub is_error: bool,
}

/// Connection to one MCP server
#[async_trait]
pub trait McpSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, ToolError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<RemoteCallResult, ToolError>;
}

/// Register every tool of `session`; returns how many were added
pub async fn register_session_tools(
    registry: &ToolRegistry,
    server: &str,
    session: Arc<dyn McpSession>,
) -> Result<usize, ToolError> {
    let tools = session.list_tools().await?;
    let count = tools.len();
    for remote in tools {
        log::info!("Registered MCP tool {}:{}", server, remote.name);
        registry
            .register(Arc::new(McpTool::new(session.clone(), remote)))
            .await;
    }
    Ok(count)
}

/// Start each configured server and register its tools
///
/// A server that fails to start or list its tools is skipped with a warning.
pub async fn attach_servers(registry: &ToolRegistry, servers: &[McpServerConfig]) -> usize {
    let mut total = 0;
    for config in servers {
        let registered = match StdioSession::connect(config).await {
            Ok(session) => register_session_tools(registry, &config.name, Arc::new(session)).await,
            Err(e) => Err(e),
        };
        match registered {
            Ok(count) => total += count,
            Err(e) => log::warn!("MCP server '{}' unavailable: {}", config.name, e),
        }
    }
    total
}
