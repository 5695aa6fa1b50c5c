// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;

use crate::adk::error::ToolError;

/// Trait for tools that can be called by agents.
///
/// `name()`, `description()` and `schema()` return borrowed data; implementations
/// keep them in struct fields or `Lazy` statics.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's input parameters
    fn schema(&self) -> &Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}
