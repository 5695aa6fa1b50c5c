// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a user-supplied reducer: `(previous, incoming) -> merged`
pub type ReducerFn = dyn Fn(&Value, &Value) -> Result<Value, String> + Send + Sync;

/// A reducer registered on a schema in code rather than by name
#[derive(Clone)]
pub struct CustomReducer(Arc<ReducerFn>);

impl CustomReducer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, previous: &Value, incoming: &Value) -> Result<Value, String> {
        (self.0)(previous, incoming)
    }
}

impl fmt::Debug for CustomReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomReducer")
    }
}

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
    /// Code-registered reducers, taking precedence over `StateFieldDef::reducer`
    #[serde(skip)]
    custom: HashMap<String, CustomReducer>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Whether `null` is a legal value
    #[serde(default)]
    pub nullable: bool,
    /// Default value
    pub default: Option<Value>,
}

impl StateFieldDef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            reducer: ReducerType::default(),
            nullable: false,
            default: None,
        }
    }

    pub fn reducer(mut self, reducer: ReducerType) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Value a fresh container starts with
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        if self.nullable {
            return Value::Null;
        }
        match self.field_type {
            FieldType::String => Value::String(String::new()),
            FieldType::Number => Value::from(0),
            FieldType::Boolean => Value::Bool(false),
            FieldType::Array => Value::Array(vec![]),
            FieldType::Object => Value::Object(Map::new()),
            FieldType::Any => Value::Null,
        }
    }

    /// Check that `value` may be stored in this field
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable || self.field_type == FieldType::Any;
        }
        self.field_type.matches(value)
    }
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Take the incoming value unless it is null (default)
    #[default]
    Replace,
    /// Take the incoming value, null included
    Overwrite,
    /// Append to array
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow-merge objects
    Merge,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, def: StateFieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    /// Attach a code-defined reducer to `name`
    pub fn with_reducer<F>(mut self, name: impl Into<String>, reducer: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), CustomReducer::new(reducer));
        self
    }

    pub fn get(&self, name: &str) -> Option<&StateFieldDef> {
        self.fields.get(name)
    }

    pub fn custom_reducer(&self, name: &str) -> Option<&CustomReducer> {
        self.custom.get(name)
    }
}
