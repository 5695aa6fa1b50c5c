// SPDX-License-Identifier: MIT

//! Structured output: ask a model for JSON matching a Rust type

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Content, Model};
use crate::adk::error::ModelError;

/// JSON schema of `T` as a plain value
pub fn json_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({}))
}

/// Call `model` and parse its reply into `T`
///
/// The schema of `T` is appended to the conversation as a system instruction.
/// The reply may wrap the JSON in a fenced code block or surround it with prose.
pub async fn generate_structured<T>(
    model: &dyn Model,
    name: &str,
    history: &[Content],
) -> Result<T, ModelError>
where
    T: JsonSchema + DeserializeOwned,
{
    let schema = json_schema::<T>();
    let instruction = format!(
        "Respond with a single JSON object named {name} that conforms to this JSON schema. \
         Do not add any other text.\n{schema}"
    );

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Content::system(instruction));
    messages.extend_from_slice(history);

    let reply = model.generate_content(&messages, None, None).await?;
    parse_structured(name, &reply.text())
}

/// Parse a model reply into `T`
pub fn parse_structured<T: DeserializeOwned>(name: &str, reply: &str) -> Result<T, ModelError> {
    let violation = |reason: String| ModelError::SchemaViolation {
        name: name.to_string(),
        reason,
    };

    let json = extract_json(reply).ok_or_else(|| violation("no JSON object in reply".to_string()))?;
    serde_json::from_str(json).map_err(|e| violation(e.to_string()))
}

/// Locate the JSON object inside a reply
fn extract_json(reply: &str) -> Option<&str> {
    let body = match reply.find("```") {
        Some(start) => {
            let fenced = &reply[start + 3..];
            let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
            match fenced.find("```") {
                Some(end) => &fenced[..end],
                None => fenced,
            }
        }
        None => reply,
    };

    let open = body.find('{')?;
    let close = body.rfind('}')?;
    (open < close).then(|| &body[open..=close])
}
