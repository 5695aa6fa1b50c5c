// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation, RawContent,
};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::{ClientHandler, ServiceExt};
use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::sync::RwLock;

use super::{McpServerConfig, McpSession, RemoteCallResult, RemoteTool};
use crate::adk::error::ToolError;

#[derive(Debug, Clone)]
pub struct KineticClientHandler;

impl ClientHandler for KineticClientHandler {
    fn get_info(&self) -> ClientInfo {
        ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
        }
    }
}

/// MCP server running as a child process; the process lives as long as the session
pub struct StdioSession {
    service: RwLock<RunningService<RoleClient, KineticClientHandler>>,
}

impl StdioSession {
    pub async fn connect(config: &McpServerConfig) -> Result<Self, ToolError> {
        log::info!(
            "Starting MCP server '{}': {} {:?}",
            config.name,
            config.command,
            config.args
        );

        let mut command = Command::new(&config.command);
        command.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(command)?;
        let service = KineticClientHandler
            .serve(transport)
            .await
            .map_err(|e| ToolError::Mcp(format!("handshake with '{}' failed: {}", config.name, e)))?;

        Ok(Self {
            service: RwLock::new(service),
        })
    }
}

#[async_trait]
impl McpSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, ToolError> {
        let service = self.service.read().await;
        let tools = service
            .list_all_tools()
            .await
            .map_err(|e| ToolError::Mcp(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| RemoteTool {
                name: tool.name.to_string(),
                description: tool.description.unwrap_or_default().to_string(),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<RemoteCallResult, ToolError> {
        let service = self.service.read().await;
        let result = service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| ToolError::Mcp(format!("call to {name} failed: {e}")))?;

        let texts = result
            .content
            .iter()
            .map(|c| match &c.raw {
                RawContent::Text(t) => t.text.clone(),
                other => format!("{other:?}"),
            })
            .collect();

        Ok(RemoteCallResult {
            texts,
            structured: result.structured_content,
            is_error: result.is_error.unwrap_or(false),
        })
    }
}
