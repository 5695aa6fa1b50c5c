// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{McpSession, RemoteCallResult, RemoteTool};
use crate::adk::error::ToolError;
use crate::adk::tool::Tool;

/// A remote MCP tool exposed through the [`Tool`] trait
pub struct McpTool {
    session: Arc<dyn McpSession>,
    remote: RemoteTool,
}

impl McpTool {
    pub fn new(session: Arc<dyn McpSession>, remote: RemoteTool) -> Self {
        Self { session, remote }
    }
}

/// Structured content when the server sent it, otherwise the joined text blocks
fn into_value(tool: &str, result: RemoteCallResult) -> Result<Value, ToolError> {
    if result.is_error {
        return Err(ToolError::Failed(format!(
            "{} reported an error: {}",
            tool,
            result.texts.join("\n")
        )));
    }
    Ok(match result.structured {
        Some(value) => value,
        None => Value::String(result.texts.join("\n")),
    })
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.remote.name
    }

    fn description(&self) -> &str {
        &self.remote.description
    }

    fn schema(&self) -> &Value {
        &self.remote.input_schema
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let arguments = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ToolError::Failed(format!(
                    "arguments of {} must be an object, got {}",
                    self.remote.name, other
                )))
            }
        };

        let result = self.session.call_tool(&self.remote.name, arguments).await?;
        into_value(&self.remote.name, result)
    }
}
