// SPDX-License-Identifier: MIT

//! Web search through the Baidu Qianfan AI search API

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adk::error::ToolError;
use crate::adk::model::structured::json_schema;
use crate::adk::tool::Tool;

const SEARCH_SOURCE: &str = "baidu_ai_search";

/// Search endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// The tool is only registered when a key is present
    pub api_key: Option<String>,
    pub endpoint: String,
    /// Results requested per resource type
    pub top_k: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://qianfan.baidubce.com/v2/ai_search/chat/completions".to_string(),
            top_k: 5,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WebSearchArgs {
    /// Search keywords
    query: String,
}

static SCHEMA: Lazy<Value> = Lazy::new(json_schema::<WebSearchArgs>);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    references: Vec<Reference>,
}

#[derive(Debug, Deserialize)]
struct Reference {
    content: Option<String>,
}

/// Search results as `{source, query, contents}`, or a message when nothing matched
fn search_result(query: &str, body: Value) -> Result<Value, ToolError> {
    let response: SearchResponse = serde_json::from_value(body)
        .map_err(|e| ToolError::Failed(format!("Invalid search response: {e}")))?;
    let contents: Vec<String> = response
        .references
        .into_iter()
        .filter_map(|r| r.content)
        .collect();

    if contents.is_empty() {
        return Ok(json!(format!("No results found for \"{query}\"")));
    }
    log::info!("Search for '{}' returned {} results", query, contents.len());
    Ok(json!({
        "source": SEARCH_SOURCE,
        "query": query,
        "contents": contents,
    }))
}

/// Looks up current information on the web
pub struct WebSearchTool {
    client: Client,
    config: SearchConfig,
}

impl WebSearchTool {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn request_body(&self, query: &str) -> Value {
        json!({
            "messages": [{ "role": "user", "content": query }],
            "search_source": "baidu_search_v2",
            "resource_type_filter": [
                { "type": "web", "top_k": self.config.top_k },
                { "type": "video", "top_k": self.config.top_k }
            ]
        })
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for recent news, facts and current events. The input is a search query."
    }

    fn schema(&self) -> &Value {
        &SCHEMA
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: WebSearchArgs = serde_json::from_value(args)?;
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(json!("BAIDU_API_KEY is not configured"));
        };
        log::info!("Searching the web for: {}", args.query);

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(&args.query))
            .send()
            .await
            .map_err(|e| ToolError::Failed(format!("Search request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ToolError::Failed(format!(
                "Search API error ({}): {}",
                status.as_u16(),
                text
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("Invalid search response: {e}")))?;
        search_result(&args.query, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_become_contents() {
        let body = json!({
            "references": [
                { "content": "Shenzhen: sunny, 28C", "url": "https://a" },
                { "url": "https://no-content" },
                { "content": "Weekend forecast: rain" }
            ]
        });

        let result = search_result("shenzhen weather", body).unwrap();
        assert_eq!(
            result,
            json!({
                "source": "baidu_ai_search",
                "query": "shenzhen weather",
                "contents": ["Shenzhen: sunny, 28C", "Weekend forecast: rain"]
            })
        );
    }

    #[test]
    fn test_empty_references_report_no_results() {
        let result = search_result("nothing", json!({ "references": [] })).unwrap();
        assert_eq!(result, json!("No results found for \"nothing\""));

        let result = search_result("nothing", json!({ "request_id": "x" })).unwrap();
        assert_eq!(result, json!("No results found for \"nothing\""));
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_to_the_model() {
        let tool = WebSearchTool::new(SearchConfig::default());
        let out = tool.execute(json!({ "query": "rust" })).await.unwrap();
        assert_eq!(out, json!("BAIDU_API_KEY is not configured"));
    }

    #[tokio::test]
    async fn test_query_is_required() {
        let tool = WebSearchTool::new(SearchConfig::default());
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_request_body_filters_resource_types() {
        let tool = WebSearchTool::new(SearchConfig {
            top_k: 3,
            ..SearchConfig::default()
        });
        let body = tool.request_body("rust");
        assert_eq!(body["messages"][0]["content"], "rust");
        assert_eq!(body["resource_type_filter"][0], json!({"type": "web", "top_k": 3}));
        assert_eq!(body["resource_type_filter"][1]["type"], "video");
    }
}
