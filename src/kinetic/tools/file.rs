// SPDX-License-Identifier: MIT

//! File tools confined to a base directory

use async_trait::async_trait;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::adk::error::ToolError;
use crate::adk::model::structured::json_schema;
use crate::adk::tool::Tool;

/// Resolve `user_path` below `base` without touching the filesystem
///
/// The path is normalized lexically. Absolute paths, paths that climb above
/// `base`, and paths that resolve to `base` itself are rejected. Symlinks
/// inside `base` are not resolved.
pub fn resolve_within(base: &Path, user_path: &str) -> Result<PathBuf, ToolError> {
    let escapes = || ToolError::PathEscapes(user_path.to_string());

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(user_path).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(escapes)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }

    if parts.is_empty() {
        return Err(escapes());
    }

    let mut resolved = base.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// File name or path relative to the files directory
    filename: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteFileArgs {
    /// File name or path relative to the files directory
    filename: String,
    /// Text to write
    content: String,
    /// `overwrite` (default) or `append`
    #[serde(default)]
    mode: WriteMode,
}

static READ_SCHEMA: Lazy<Value> = Lazy::new(json_schema::<ReadFileArgs>);
static WRITE_SCHEMA: Lazy<Value> = Lazy::new(json_schema::<WriteFileArgs>);

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Reads a text file under the base directory
pub struct ReadFileTool {
    base: PathBuf,
}

impl ReadFileTool {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a text file in the files directory"
    }

    fn schema(&self) -> &Value {
        &READ_SCHEMA
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: ReadFileArgs = serde_json::from_value(args)?;
        let path = resolve_within(&self.base, &args.filename)?;
        log::info!("Reading file {}", path.display());

        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Ok(json!(format!("File not found: {}", display_name(&path))));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Value::String(content))
    }
}

/// Writes or appends to a text file under the base directory
pub struct WriteFileTool {
    base: PathBuf,
}

impl WriteFileTool {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file in the files directory, overwriting or appending"
    }

    fn schema(&self) -> &Value {
        &WRITE_SCHEMA
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: WriteFileArgs = serde_json::from_value(args)?;
        let path = resolve_within(&self.base, &args.filename)?;
        log::info!("Writing file {} ({:?})", path.display(), args.mode);

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(args.mode == WriteMode::Append)
            .truncate(args.mode == WriteMode::Overwrite)
            .open(&path)
            .await?;
        file.write_all(args.content.as_bytes()).await?;
        file.flush().await?;

        let mode = match args.mode {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
        };
        Ok(json!(format!("Wrote {} (mode: {})", display_name(&path), mode)))
    }
}
