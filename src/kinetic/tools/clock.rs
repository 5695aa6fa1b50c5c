// SPDX-License-Identifier: MIT

//! Wall-clock tool

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone, Utc};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;

use crate::adk::error::ToolError;
use crate::adk::model::structured::json_schema;
use crate::adk::tool::Tool;

pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default, Clone, Copy, Deserialize, JsonSchema, PartialEq)]
enum Zone {
    #[default]
    #[serde(rename = "UTC", alias = "utc")]
    Utc,
    #[serde(rename = "local", alias = "LOCAL")]
    Local,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct CurrentTimeArgs {
    /// strftime format, defaults to `%Y-%m-%d %H:%M:%S`
    #[serde(default)]
    fmt: Option<String>,
    /// `UTC` (default) or `local`
    #[serde(default)]
    tz: Zone,
}

static SCHEMA: Lazy<Value> = Lazy::new(json_schema::<CurrentTimeArgs>);

/// Returns the current time as a formatted string
#[derive(Default)]
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self
    }
}

/// Format `now`, falling back to RFC 3339 when `fmt` is not a valid strftime string
fn format_time<Tz>(now: DateTime<Tz>, fmt: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let items: Vec<Item> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        log::warn!("Invalid time format '{}', using RFC 3339", fmt);
        return now.to_rfc3339();
    }
    now.format_with_items(items.into_iter()).to_string()
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time"
    }

    fn schema(&self) -> &Value {
        &SCHEMA
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: CurrentTimeArgs = if args.is_null() {
            CurrentTimeArgs::default()
        } else {
            serde_json::from_value(args)?
        };
        let fmt = args.fmt.as_deref().unwrap_or(DEFAULT_TIME_FORMAT);

        let formatted = match args.tz {
            Zone::Utc => format_time(Utc::now(), fmt),
            Zone::Local => format_time(Local::now(), fmt),
        };
        Ok(Value::String(formatted))
    }
}
