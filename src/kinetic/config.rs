// SPDX-License-Identifier: MIT

//! Runtime settings
//!
//! Settings come from an optional YAML file, then environment variables
//! override individual values:
//!
//! | Variable | Setting |
//! |---|---|
//! | `MODEL_API_KEY` (`DEEPSEEK_API_KEY`, `OPENAI_API_KEY`) | model API key |
//! | `MODEL_BASE_URL` | chat-completions base URL |
//! | `MODEL_NAME` | model name |
//! | `MODEL_TEMPERATURE` | sampling temperature |
//! | `KINETIC_FILES_DIR` | base directory of the file tools |
//! | `KINETIC_MAX_ITERATIONS` | step budget per graph run |
//! | `BAIDU_API_KEY` | web search key; enables the `web_search` tool |
//! | `AMAP_MAPS_API_KEY` (`AMAP_API_KEY`, `AMAP_KEY`) | adds the AMap MCP server |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::adk::error::ConfigError;
use crate::adk::model::OpenAiConfig;
use crate::kinetic::mcp::McpServerConfig;
use crate::kinetic::tools::SearchConfig;
use crate::kinetic::workflow::graph::ExecutorConfig;

const API_KEY_VARS: [&str; 3] = ["MODEL_API_KEY", "DEEPSEEK_API_KEY", "OPENAI_API_KEY"];
const AMAP_KEY_VARS: [&str; 3] = ["AMAP_MAPS_API_KEY", "AMAP_API_KEY", "AMAP_KEY"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: OpenAiConfig,
    pub files_dir: PathBuf,
    pub max_iterations: Option<u32>,
    pub search: SearchConfig,
    /// MCP servers whose tools the chat agent can use
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: OpenAiConfig::default(),
            files_dir: PathBuf::from("./files"),
            max_iterations: None,
            search: SearchConfig::default(),
            mcp_servers: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if any) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = API_KEY_VARS.iter().find_map(|var| get(*var)) {
            self.model.api_key = Some(key);
        }
        if let Some(url) = get("MODEL_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(name) = get("MODEL_NAME") {
            self.model.model_name = name;
        }
        if let Some(temp) = get("MODEL_TEMPERATURE") {
            self.model.temperature = Some(parse("MODEL_TEMPERATURE", &temp)?);
        }
        if let Some(dir) = get("KINETIC_FILES_DIR") {
            self.files_dir = PathBuf::from(dir);
        }
        if let Some(limit) = get("KINETIC_MAX_ITERATIONS") {
            self.max_iterations = Some(parse("KINETIC_MAX_ITERATIONS", &limit)?);
        }
        if let Some(key) = get("BAIDU_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(key) = AMAP_KEY_VARS.iter().find_map(|var| get(*var)) {
            if self.mcp_servers.iter().any(|s| s.name == "amap") {
                log::debug!("AMap MCP server already configured, ignoring AMap key");
            } else {
                self.mcp_servers.push(McpServerConfig::amap(key));
            }
        }
        Ok(())
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_iterations: self.max_iterations,
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
