// SPDX-License-Identifier: MIT

//! Checkpoint persistence for resumable conversation threads

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::adk::error::BoxError;

/// Snapshot of a thread's state after one step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub id: Uuid,
    pub thread_id: String,
    /// Step whose update produced this state
    pub step: String,
    pub state: Value,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<String>, step: impl Into<String>, state: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            step: step.into(),
            state,
            created_at: Utc::now(),
        }
    }
}

/// Storage backend for checkpoints, keyed by thread id
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Latest checkpoint of a thread, if any
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, BoxError>;

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), BoxError>;
}

/// Checkpoints kept per thread by [`InMemoryCheckpointer::new`]
pub const DEFAULT_HISTORY_LIMIT: usize = 16;

/// Process-local checkpointer; history is lost on exit
///
/// Each thread keeps at most `history_limit` checkpoints, dropping the oldest.
pub struct InMemoryCheckpointer {
    threads: RwLock<HashMap<String, VecDeque<Checkpoint>>>,
    history_limit: usize,
}

impl Default for InMemoryCheckpointer {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` checkpoints per thread (at least one)
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            history_limit: limit.max(1),
        }
    }

    /// Retained checkpoints of a thread, oldest first
    pub async fn history(&self, thread_id: &str) -> Vec<Checkpoint> {
        let threads = self.threads.read().await;
        threads
            .get(thread_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn thread_ids(&self) -> Vec<String> {
        let threads = self.threads.read().await;
        let mut ids: Vec<String> = threads.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, BoxError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|h| h.back()).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), BoxError> {
        let mut threads = self.threads.write().await;
        let history = threads.entry(checkpoint.thread_id.clone()).or_default();
        history.push_back(checkpoint);
        while history.len() > self.history_limit {
            history.pop_front();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetic::workflow::graph::{step_fn, ExecutorConfig, RunConfig, StateGraph, END, START};
    use crate::kinetic::workflow::state::{
        FieldType, ReducerType, StateFieldDef, StateSchema, StateUpdate, WorkflowState,
    };
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_returns_latest() {
        let store = InMemoryCheckpointer::new();
        assert!(store.load("t1").await.unwrap().is_none());

        store.save(Checkpoint::new("t1", "a", json!({"n": 1}))).await.unwrap();
        store.save(Checkpoint::new("t1", "b", json!({"n": 2}))).await.unwrap();
        store.save(Checkpoint::new("t2", "a", json!({"n": 9}))).await.unwrap();

        let latest = store.load("t1").await.unwrap().unwrap();
        assert_eq!(latest.step, "b");
        assert_eq!(latest.state, json!({"n": 2}));
        assert_eq!(store.history("t1").await.len(), 2);
        assert_eq!(store.thread_ids().await, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_history_is_capped_per_thread() {
        let store = InMemoryCheckpointer::with_history_limit(3);
        for n in 0..10 {
            store
                .save(Checkpoint::new("long", format!("s{n}"), json!({"n": n})))
                .await
                .unwrap();
        }

        let steps: Vec<String> = store
            .history("long")
            .await
            .into_iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(steps, vec!["s7", "s8", "s9"]);
        assert_eq!(store.load("long").await.unwrap().unwrap().state, json!({"n": 9}));

        let single = InMemoryCheckpointer::with_history_limit(0);
        single.save(Checkpoint::new("t", "a", json!(1))).await.unwrap();
        single.save(Checkpoint::new("t", "b", json!(2))).await.unwrap();
        assert_eq!(single.history("t").await.len(), 1);
    }

    #[tokio::test]
    async fn test_graph_resumes_thread_state() {
        let store = Arc::new(InMemoryCheckpointer::new());
        let schema = StateSchema::new().field(
            "messages",
            StateFieldDef::new(FieldType::Array).reducer(ReducerType::Append),
        );
        let graph = StateGraph::new("echo", schema)
            .add_step(
                "echo",
                step_fn(|state: WorkflowState| async move {
                    let seen = state.len_of("messages");
                    Ok(StateUpdate::new().set("messages", json!([format!("seen {seen}")])))
                }),
            )
            .add_edge(START, "echo")
            .add_edge("echo", END)
            .compile_with(ExecutorConfig::default(), Some(store.clone()))
            .unwrap();

        let thread = RunConfig::thread("alice");
        graph
            .run_with(StateUpdate::new().set("messages", json!(["hi"])), &thread)
            .await
            .unwrap();
        let second = graph
            .run_with(StateUpdate::new().set("messages", json!(["again"])), &thread)
            .await
            .unwrap();

        assert_eq!(
            second.get("messages"),
            Some(&json!(["hi", "seen 1", "again", "seen 3"]))
        );
        assert_eq!(store.history("alice").await.len(), 2);

        // Runs without a thread id neither read nor write checkpoints
        let fresh = graph.run(StateUpdate::new()).await.unwrap();
        assert_eq!(fresh.get("messages"), Some(&json!(["seen 0"])));
        assert_eq!(store.thread_ids().await, vec!["alice"]);
    }
}
