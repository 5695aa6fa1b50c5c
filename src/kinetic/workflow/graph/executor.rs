// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Walks a compiled graph from START to END one step at a time. Batch runs
//! and streams share the same driver, so both observe the same step order
//! and the same merged states.

use futures::stream::{self, Stream};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::types::{Edge, Step, END, START};
use crate::adk::error::RunError;
use crate::kinetic::workflow::checkpoint::{Checkpoint, Checkpointer};
use crate::kinetic::workflow::state::{StateSchema, StateUpdate, WorkflowState};

/// Executor settings fixed at compile time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorConfig {
    /// Upper bound on step invocations per run; `None` trusts the routers
    pub max_iterations: Option<u32>,
}

impl ExecutorConfig {
    pub fn with_max_iterations(limit: u32) -> Self {
        Self {
            max_iterations: Some(limit),
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Conversation thread; enables checkpoint read/write when the graph has a store
    pub thread_id: Option<String>,
}

impl RunConfig {
    pub fn thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
        }
    }
}

/// Element of a streaming run
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A step finished and its update has been merged
    Step { step: String, update: StateUpdate },
    /// The run reached END; always the last element of a successful stream
    Finished { state: WorkflowState },
}

struct GraphInner {
    name: String,
    schema: Arc<StateSchema>,
    steps: HashMap<String, Arc<dyn Step>>,
    order: Vec<String>,
    edges: HashMap<String, Edge>,
    config: ExecutorConfig,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

/// Immutable, validated graph
///
/// Cloning is cheap; clones share the same steps and may run concurrently,
/// each run owning its own state.
#[derive(Clone)]
pub struct CompiledGraph {
    inner: Arc<GraphInner>,
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("name", &self.inner.name)
            .field("steps", &self.inner.order)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl CompiledGraph {
    pub(crate) fn new(
        name: String,
        schema: Arc<StateSchema>,
        steps: HashMap<String, Arc<dyn Step>>,
        order: Vec<String>,
        edges: HashMap<String, Edge>,
        config: ExecutorConfig,
        checkpointer: Option<Arc<dyn Checkpointer>>,
    ) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                name,
                schema,
                steps,
                order,
                edges,
                config,
                checkpointer,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.inner.schema
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Step names in registration order
    pub fn step_names(&self) -> Vec<&str> {
        self.inner.order.iter().map(String::as_str).collect()
    }

    pub(crate) fn edges(&self) -> &HashMap<String, Edge> {
        &self.inner.edges
    }

    /// Run to completion and return the final state
    pub async fn run(&self, input: StateUpdate) -> Result<WorkflowState, RunError> {
        self.run_with(input, &RunConfig::default()).await
    }

    /// Run to completion with per-run options
    pub async fn run_with(
        &self,
        input: StateUpdate,
        run_config: &RunConfig,
    ) -> Result<WorkflowState, RunError> {
        let mut run = Run::start(self.clone(), input, run_config.clone()).await?;
        while run.advance().await?.is_some() {}
        log::info!(
            "Graph '{}' finished after {} steps",
            self.name(),
            run.iterations
        );
        Ok(run.state)
    }

    /// Lazily run the graph, yielding one event per completed step
    ///
    /// Nothing executes until the stream is polled. Dropping the stream
    /// drops the in-flight step, so no work outlives the consumer.
    pub fn stream(
        &self,
        input: StateUpdate,
    ) -> impl Stream<Item = Result<GraphEvent, RunError>> + Send + 'static {
        self.stream_with(input, RunConfig::default())
    }

    /// Streaming run with per-run options
    pub fn stream_with(
        &self,
        input: StateUpdate,
        run_config: RunConfig,
    ) -> impl Stream<Item = Result<GraphEvent, RunError>> + Send + 'static {
        let graph = self.clone();
        let init = StreamState::Pending {
            graph,
            input,
            run_config,
        };

        stream::unfold(init, |cursor| async move {
            let mut run = match cursor {
                StreamState::Pending {
                    graph,
                    input,
                    run_config,
                } => match Run::start(graph, input, run_config).await {
                    Ok(run) => run,
                    Err(e) => return Some((Err(e), StreamState::Done)),
                },
                StreamState::Running(run) => run,
                StreamState::Done => return None,
            };

            match run.advance().await {
                Ok(Some((step, update))) => Some((
                    Ok(GraphEvent::Step { step, update }),
                    StreamState::Running(run),
                )),
                Ok(None) => Some((
                    Ok(GraphEvent::Finished { state: run.state }),
                    StreamState::Done,
                )),
                Err(e) => Some((Err(e), StreamState::Done)),
            }
        })
    }

    /// Resolve the successor of `from` for the given state
    fn next_step(&self, from: &str, state: &WorkflowState) -> Result<String, RunError> {
        match self.inner.edges.get(from) {
            Some(Edge::Fixed(target)) => Ok(target.clone()),
            Some(Edge::Conditional { router, routes }) => {
                let key = router(state);
                match routes.get(&key) {
                    Some(target) => {
                        log::info!("Router after '{}' chose '{}' -> {}", from, key, target);
                        Ok(target.clone())
                    }
                    None => Err(RunError::RouterViolation {
                        step: from.to_string(),
                        value: key,
                    }),
                }
            }
            // Compilation guarantees an edge for every step and START
            None => Err(RunError::UnknownStep(from.to_string())),
        }
    }
}

enum StreamState {
    Pending {
        graph: CompiledGraph,
        input: StateUpdate,
        run_config: RunConfig,
    },
    Running(Box<Run>),
    Done,
}

/// One in-progress run
struct Run {
    graph: CompiledGraph,
    state: WorkflowState,
    /// Last completed step; its outgoing edge is resolved by the next `advance`
    last: String,
    iterations: u32,
    thread_id: Option<String>,
    /// Failure raised after a step completed, reported on the following call
    deferred: Option<RunError>,
}

impl Run {
    async fn start(
        graph: CompiledGraph,
        input: StateUpdate,
        run_config: RunConfig,
    ) -> Result<Box<Run>, RunError> {
        let schema = graph.schema().clone();
        let thread_id = run_config.thread_id;

        let base = match (&graph.inner.checkpointer, &thread_id) {
            (Some(store), Some(thread)) => match store.load(thread).await {
                Ok(Some(checkpoint)) => {
                    log::info!(
                        "Resuming thread '{}' from checkpoint after '{}'",
                        thread,
                        checkpoint.step
                    );
                    WorkflowState::from_snapshot(schema, &checkpoint.state)
                }
                Ok(None) => WorkflowState::new(schema),
                Err(e) => return Err(RunError::Checkpoint(e.to_string())),
            },
            _ => WorkflowState::new(schema),
        };

        let state = base.merge(&input).map_err(|source| RunError::StateMerge {
            step: START.to_string(),
            source,
        })?;

        log::info!("Starting graph '{}'", graph.name());

        Ok(Box::new(Run {
            graph,
            state,
            last: START.to_string(),
            iterations: 0,
            thread_id,
            deferred: None,
        }))
    }

    /// Route from the last step and execute the next one; `None` once END is reached
    ///
    /// The completed step is always returned before any failure that follows
    /// it, so a stream yields its event ahead of the error.
    async fn advance(&mut self) -> Result<Option<(String, StateUpdate)>, RunError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        let name = self.graph.next_step(&self.last, &self.state)?;
        if name == END {
            return Ok(None);
        }

        if let Some(limit) = self.graph.config().max_iterations {
            if self.iterations >= limit {
                log::error!(
                    "Graph '{}' exceeded {} iterations at '{}'",
                    self.graph.name(),
                    limit,
                    name
                );
                return Err(RunError::IterationLimitExceeded { limit });
            }
        }

        let step = self
            .graph
            .inner
            .steps
            .get(&name)
            .cloned()
            .ok_or_else(|| RunError::UnknownStep(name.clone()))?;

        log::info!("Executing step: {}", name);
        self.iterations += 1;

        let update = match step.run(&self.state).await {
            Ok(update) => update,
            Err(source) => {
                log::error!("Step {} failed: {}", name, source);
                return Err(RunError::StepFailed {
                    step: name,
                    state: self.state.to_json(),
                    source,
                });
            }
        };

        self.state = self
            .state
            .merge(&update)
            .map_err(|source| RunError::StateMerge {
                step: name.clone(),
                source,
            })?;
        log::debug!("Step {} merged update: {:?}", name, update);

        if let (Some(store), Some(thread)) = (&self.graph.inner.checkpointer, &self.thread_id) {
            let checkpoint = Checkpoint::new(thread.clone(), name.clone(), self.state.to_json());
            if let Err(e) = store.save(checkpoint).await {
                log::error!("Checkpoint after {} failed: {}", name, e);
                self.deferred = Some(RunError::Checkpoint(e.to_string()));
            }
        }

        self.last = name.clone();
        Ok(Some((name, update)))
    }
}
