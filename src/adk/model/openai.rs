// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat-completions client
//!
//! Works against any endpoint speaking the `/chat/completions` dialect
//! (DeepSeek, DashScope compatible mode, OpenAI itself).

use super::{Content, GenerationConfig, Model, Part, Role};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Missing keys only fail when a request is made
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_name: String,
    pub temperature: Option<f32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model_name: "deepseek-chat".to_string(),
            temperature: Some(0.7),
        }
    }
}

/// Chat model backed by an OpenAI-compatible HTTP API
pub struct OpenAiCompatibleModel {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiCompatibleModel {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Convert internal Content to OpenAI messages
    ///
    /// A tool content expands to one `tool` message per response part.
    fn content_to_openai_messages(content: &Content) -> Vec<Value> {
        if content.role == Role::Tool {
            return content
                .parts
                .iter()
                .filter_map(|part| match part {
                    Part::FunctionResponse { id, response, .. } => Some(json!({
                        "role": "tool",
                        "tool_call_id": id,
                        "content": match response {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();
        }

        let role = match content.role {
            Role::System => "system",
            Role::User => "user",
            Role::Model | Role::Tool => "assistant",
        };

        let mut tool_calls = Vec::new();
        let mut text_content = String::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text_content.push_str(t),
                Part::FunctionCall { id, name, args } => tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": args.to_string()
                    }
                })),
                Part::FunctionResponse { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            vec![json!({ "role": role, "content": text_content })]
        } else {
            vec![json!({
                "role": role,
                "content": if text_content.is_empty() { Value::Null } else { json!(text_content) },
                "tool_calls": tool_calls
            })]
        }
    }

    fn tools_to_openai_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    fn parse_openai_response(response: &Value) -> Result<Content, ModelError> {
        let message = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .map(|choice| &choice["message"])
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let mut parts = Vec::new();
        if let Some(text) = message["content"].as_str() {
            if !text.is_empty() {
                parts.push(Part::Text(text.to_string()));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for (i, tc) in tool_calls.iter().enumerate() {
                let name = tc["function"]["name"]
                    .as_str()
                    .ok_or_else(|| ModelError::InvalidResponse("tool call without name".to_string()))?
                    .to_string();
                let id = tc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{i}"));
                let raw_args = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args = serde_json::from_str(raw_args).map_err(|e| {
                    ModelError::InvalidResponse(format!("arguments of '{name}': {e}"))
                })?;
                parts.push(Part::FunctionCall { id, name, args });
            }
        }

        Ok(Content::new(Role::Model, parts))
    }

    fn request_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Value {
        let messages: Vec<Value> = history
            .iter()
            .flat_map(Self::content_to_openai_messages)
            .collect();

        let mut body = json!({
            "model": self.config.model_name,
            "messages": messages
        });

        let temperature = config
            .and_then(|c| c.temperature)
            .or(self.config.temperature);
        if let Some(temp) = temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(cfg) = config {
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = json!(Self::tools_to_openai_format(tools));
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl Model for OpenAiCompatibleModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::ApiKeyMissing(self.config.base_url.clone()))?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = self.request_body(history, config, tools);
        log::debug!("Chat request to {}: {}", url, body);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("Chat response: {}", resp_json);
        Self::parse_openai_response(&resp_json)
    }
}
