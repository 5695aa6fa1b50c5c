// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::schema::{ReducerType, StateSchema};
use crate::adk::error::StateMergeError;

/// A partial state record returned by a step
///
/// Only the fields present are merged; everything else keeps its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateUpdate(Map<String, Value>);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for StateUpdate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for StateUpdate {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Runtime workflow state with reducer support
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Current state values
    fields: Map<String, Value>,
    /// Field definitions and reducers
    schema: Arc<StateSchema>,
}

impl WorkflowState {
    /// Create a new WorkflowState from a schema, materializing every default
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|(name, def)| (name.clone(), def.initial_value()))
            .collect();

        Self { fields, schema }
    }

    /// Create an empty, schema-less WorkflowState
    pub fn empty() -> Self {
        Self {
            fields: Map::new(),
            schema: Arc::new(StateSchema::default()),
        }
    }

    /// Rebuild a state from a JSON snapshot without running reducers
    pub fn from_snapshot(schema: Arc<StateSchema>, snapshot: &Value) -> Self {
        let mut state = Self::new(schema);
        if let Value::Object(map) = snapshot {
            for (key, value) in map {
                state.fields.insert(key.clone(), value.clone());
            }
        }
        state
    }

    /// Update a field using the appropriate reducer
    pub fn update(&mut self, key: &str, value: Value) -> Result<(), StateMergeError> {
        let previous = self.fields.get(key).cloned().unwrap_or(Value::Null);
        let merged = self.reduce(key, &previous, &value)?;
        self.fields.insert(key.to_string(), merged);
        Ok(())
    }

    /// Fold a partial update into a new state
    ///
    /// `self` is left untouched; a failing field discards the whole update.
    pub fn merge(&self, update: &StateUpdate) -> Result<WorkflowState, StateMergeError> {
        let mut next = self.clone();
        for (key, value) in update.iter() {
            next.update(key, value.clone())?;
        }
        Ok(next)
    }

    fn reduce(&self, key: &str, previous: &Value, incoming: &Value) -> Result<Value, StateMergeError> {
        let fail = |reason: String| StateMergeError::new(key, previous, incoming, reason);

        if let Some(custom) = self.schema.custom_reducer(key) {
            return custom.apply(previous, incoming).map_err(fail);
        }

        let Some(def) = self.schema.get(key) else {
            // Undeclared fields behave like `replace`
            return Ok(if incoming.is_null() {
                previous.clone()
            } else {
                incoming.clone()
            });
        };

        match def.reducer {
            ReducerType::Replace => {
                if incoming.is_null() {
                    return Ok(previous.clone());
                }
                if !def.accepts(incoming) {
                    return Err(fail(format!("expected {}", def.field_type)));
                }
                Ok(incoming.clone())
            }
            ReducerType::Overwrite => {
                if !def.accepts(incoming) {
                    return Err(fail(format!("expected {}", def.field_type)));
                }
                Ok(incoming.clone())
            }
            ReducerType::Append => {
                let mut items = match previous {
                    Value::Array(items) => items.clone(),
                    Value::Null => vec![],
                    _ => return Err(fail("append target is not an array".to_string())),
                };
                match incoming {
                    Value::Array(new_items) => items.extend(new_items.iter().cloned()),
                    Value::Null => {}
                    other => items.push(other.clone()),
                }
                Ok(Value::Array(items))
            }
            ReducerType::Max | ReducerType::Min => {
                if incoming.is_null() {
                    return Ok(previous.clone());
                }
                let Some(new) = incoming.as_f64() else {
                    return Err(fail("expected number".to_string()));
                };
                let keep_new = match previous.as_f64() {
                    None => true,
                    Some(current) if def.reducer == ReducerType::Max => new > current,
                    Some(current) => new < current,
                };
                Ok(if keep_new {
                    incoming.clone()
                } else {
                    previous.clone()
                })
            }
            ReducerType::Merge => {
                let mut merged = match previous {
                    Value::Object(obj) => obj.clone(),
                    Value::Null => Map::new(),
                    _ => return Err(fail("merge target is not an object".to_string())),
                };
                match incoming {
                    Value::Object(new_obj) => {
                        for (k, v) in new_obj {
                            merged.insert(k.clone(), v.clone());
                        }
                    }
                    Value::Null => {}
                    _ => return Err(fail("expected object".to_string())),
                }
                Ok(Value::Object(merged))
            }
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a string field, if it holds one
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Get a non-negative integer field, if it holds one
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }

    /// Get the length of an array field (0 when absent or not an array)
    pub fn len_of(&self, key: &str) -> usize {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Deserialize a field into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.fields
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Two states are equal when their values are; the schema is not compared
impl PartialEq for WorkflowState {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
