// SPDX-License-Identifier: MIT

//! Model module - defines the chat model trait and shared message types
//!
//! Implementations live in their own submodules:
//! - [openai] - any OpenAI-compatible chat-completions endpoint
//!
//! [structured] layers JSON-schema constrained output on top of any model.

pub mod openai;
pub mod structured;

use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub use openai::{OpenAiCompatibleModel, OpenAiConfig};
pub use structured::generate_structured;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Model,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// Parts of a message - text, function calls and their results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    /// Tool call requested by the model
    FunctionCall { id: String, name: String, args: Value },
    /// Result of a tool call, answering the call with the same id
    FunctionResponse {
        id: String,
        name: String,
        response: Value,
    },
}

impl Content {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::Text(text.into())])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::Text(text.into())])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::Text(text.into())])
    }

    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, response: Value) -> Self {
        Self::new(
            Role::Tool,
            vec![Part::FunctionResponse {
                id: id.into(),
                name: name.into(),
                response,
            }],
        )
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// `(id, name, args)` of every requested tool call
    pub fn function_calls(&self) -> Vec<(&str, &str, &Value)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall { id, name, args } => {
                    Some((id.as_str(), name.as_str(), args))
                }
                _ => None,
            })
            .collect()
    }
}

/// Core trait for chat model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError>;
}
