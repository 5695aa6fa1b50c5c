// SPDX-License-Identifier: MIT

//! Typed error handling for kinetic-graph
//!
//! Errors are grouped by the phase that raises them:
//! - `GraphError` - graph construction, raised only by `compile()`
//! - `RunError` - a single graph run (step failures, routing, merging)
//! - `StateMergeError` - a reducer rejecting an update
//! - `ModelError` / `ToolError` - collaborator failures
//! - `ConfigError` - settings loading

use serde_json::Value;
use thiserror::Error;

/// Boxed error returned by step bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for kinetic-graph
#[derive(Debug, Error)]
pub enum KineticError {
    /// Graph failed validation at compile time
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// A graph run aborted
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// Model invocation failed outside a graph run
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Tool invocation failed outside a graph run
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Graph construction errors, all raised by `StateGraph::compile`
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// Two steps were registered under the same name
    #[error("Step '{0}' is registered more than once")]
    DuplicateStep(String),

    /// An edge points at (or leaves from) a step that does not exist
    #[error("Edge {from} -> {to} references unknown step '{missing}'")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },

    /// Nothing leaves START
    #[error("Graph '{0}' has no edge from START")]
    NoEntryPoint(String),

    /// A step tried to use START or END as its name
    #[error("'{0}' is a reserved step name")]
    ReservedName(String),

    /// A source owns more than one outgoing edge
    #[error("Step '{0}' has more than one outgoing edge")]
    ConflictingEdges(String),

    /// A registered step has no way out
    #[error("Step '{0}' has no outgoing edge")]
    MissingOutgoingEdge(String),
}

/// Errors that abort a graph run
#[derive(Debug, Error)]
pub enum RunError {
    /// A step body returned an error
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        /// State the step was invoked with
        state: Value,
        #[source]
        source: BoxError,
    },

    /// A router returned a value that is not in its allow-list
    #[error("Router after '{step}' returned '{value}', which has no route")]
    RouterViolation { step: String, value: String },

    /// A reducer rejected a step's update
    #[error("Merging the update of '{step}' failed: {source}")]
    StateMerge {
        step: String,
        #[source]
        source: StateMergeError,
    },

    /// The configured step budget ran out
    #[error("Max iterations reached: {limit}")]
    IterationLimitExceeded { limit: u32 },

    /// Routing resolved to a name with no step body
    #[error("Step '{0}' not found")]
    UnknownStep(String),

    /// The checkpoint store failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl RunError {
    /// Name of the step the error is attributed to, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            RunError::StepFailed { step, .. }
            | RunError::RouterViolation { step, .. }
            | RunError::StateMerge { step, .. } => Some(step),
            RunError::UnknownStep(step) => Some(step),
            RunError::IterationLimitExceeded { .. } | RunError::Checkpoint(_) => None,
        }
    }
}

/// A reducer refused to combine two values
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Cannot merge field '{field}' ({previous} <- {incoming}): {reason}")]
pub struct StateMergeError {
    pub field: String,
    pub previous: Value,
    pub incoming: Value,
    pub reason: String,
}

impl StateMergeError {
    pub fn new(
        field: impl Into<String>,
        previous: &Value,
        incoming: &Value,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            previous: previous.clone(),
            incoming: incoming.clone(),
            reason: reason.into(),
        }
    }
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for endpoint: {0}")]
    ApiKeyMissing(String),

    /// Provider answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Structured output could not be coerced into the declared schema
    #[error("Output of '{name}' does not match its schema: {reason}")]
    SchemaViolation { name: String, reason: String },
}

/// Tool-specific errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    /// A path resolved outside the tool's base directory
    #[error("Path '{0}' escapes the base directory")]
    PathEscapes(String),

    /// Tool not found during execution
    #[error("Tool '{0}' not found")]
    NotFound(String),

    /// An MCP server could not be reached or answered with a protocol error
    #[error("MCP error: {0}")]
    Mcp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Settings loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
