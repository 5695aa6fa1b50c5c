// SPDX-License-Identifier: MIT

//! Built-in tools for the ReAct agent

mod clock;
mod file;
mod search;

pub use clock::{CurrentTimeTool, DEFAULT_TIME_FORMAT};
pub use file::{resolve_within, ReadFileTool, WriteFileTool};
pub use search::{SearchConfig, WebSearchTool};

use crate::kinetic::workflow::registry::ToolRegistry;
use std::path::Path;
use std::sync::Arc;

/// Registry holding the clock and the file tools rooted at `files_dir`
///
/// Web search is added when `search` carries an API key.
pub async fn default_registry(files_dir: &Path, search: &SearchConfig) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(CurrentTimeTool::new())).await;
    registry.register(Arc::new(ReadFileTool::new(files_dir))).await;
    registry.register(Arc::new(WriteFileTool::new(files_dir))).await;
    if search.api_key.is_some() {
        registry.register(Arc::new(WebSearchTool::new(search.clone()))).await;
    } else {
        log::info!("BAIDU_API_KEY not set, web search disabled");
    }
    registry
}
