// SPDX-License-Identifier: MIT

//! Graph builder - registers steps and edges, validates on compile
//!
//! ```rust,no_run
//! use kinetic_graph::kinetic::workflow::graph::{step_fn, StateGraph, END, START};
//! use kinetic_graph::kinetic::workflow::state::{StateSchema, StateUpdate};
//!
//! let graph = StateGraph::new("hello", StateSchema::new())
//!     .add_step("greet", step_fn(|_| async { Ok(StateUpdate::new().set("greeting", "hi")) }))
//!     .add_edge(START, "greet")
//!     .add_edge("greet", END)
//!     .compile()?;
//! # Ok::<(), kinetic_graph::adk::error::GraphError>(())
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::executor::{CompiledGraph, ExecutorConfig};
use super::types::{Edge, RouteTable, RouterFn, Step, END, START};
use crate::adk::error::GraphError;
use crate::kinetic::workflow::checkpoint::Checkpointer;
use crate::kinetic::workflow::state::{StateSchema, WorkflowState};

/// Sentinel router key produced when a table router cannot classify the state
pub const UNCLASSIFIED: &str = "<unclassified>";

/// Mutable graph under construction
pub struct StateGraph {
    name: String,
    schema: StateSchema,
    steps: HashMap<String, Arc<dyn Step>>,
    /// Registration order, for deterministic validation and diagrams
    order: Vec<String>,
    edges: Vec<(String, Edge)>,
    duplicates: Vec<String>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>, schema: StateSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            steps: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    /// Register a step under `name`
    ///
    /// Re-registering a name is reported by `compile()`.
    pub fn add_step(mut self, name: impl Into<String>, step: impl Step + 'static) -> Self {
        let name = name.into();
        if self.steps.insert(name.clone(), Arc::new(step)).is_some() {
            self.duplicates.push(name);
        } else {
            self.order.push(name);
        }
        self
    }

    /// Unconditional edge `from -> to`
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), Edge::Fixed(to.into())));
        self
    }

    /// Conditional edge: `router` picks a key, `routes` maps keys to targets
    pub fn add_conditional_edge<R, I, K, V>(
        mut self,
        from: impl Into<String>,
        router: R,
        routes: I,
    ) -> Self
    where
        R: Fn(&WorkflowState) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let routes = routes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let router: RouterFn = Arc::new(router);
        self.edges
            .push((from.into(), Edge::Conditional { router, routes }));
        self
    }

    /// Conditional edge driven by a [`RouteTable`]
    ///
    /// `classify` returns the table value, or the raw unroutable value on
    /// failure, which the executor reports as a router violation.
    pub fn add_routed_edge<T, C>(self, from: impl Into<String>, classify: C) -> Self
    where
        T: RouteTable,
        C: Fn(&WorkflowState) -> Result<T, String> + Send + Sync + 'static,
    {
        let router = move |state: &WorkflowState| match classify(state) {
            Ok(value) => value.key().to_string(),
            Err(raw) if raw.is_empty() => UNCLASSIFIED.to_string(),
            Err(raw) => raw,
        };
        self.add_conditional_edge(from, router, T::routes())
    }

    /// Validate and freeze the graph with the default executor settings
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        self.compile_with(ExecutorConfig::default(), None)
    }

    /// Validate and freeze the graph
    pub fn compile_with(
        self,
        config: ExecutorConfig,
        checkpointer: Option<Arc<dyn Checkpointer>>,
    ) -> Result<CompiledGraph, GraphError> {
        self.validate()?;

        let edges: HashMap<String, Edge> = self.edges.into_iter().collect();

        log::info!(
            "Compiled graph '{}' with {} steps and {} edges",
            self.name,
            self.order.len(),
            edges.len()
        );

        Ok(CompiledGraph::new(
            self.name,
            Arc::new(self.schema),
            self.steps,
            self.order,
            edges,
            config,
            checkpointer,
        ))
    }

    fn validate(&self) -> Result<(), GraphError> {
        if let Some(name) = self.duplicates.first() {
            return Err(GraphError::DuplicateStep(name.clone()));
        }

        if let Some(name) = self.order.iter().find(|n| *n == START || *n == END) {
            return Err(GraphError::ReservedName(name.clone()));
        }

        let mut sources: HashSet<&str> = HashSet::new();
        for (from, edge) in &self.edges {
            if from != START && !self.steps.contains_key(from) {
                return Err(GraphError::DanglingEdge {
                    from: from.clone(),
                    to: edge.targets().join("|"),
                    missing: from.clone(),
                });
            }
            for to in edge.targets() {
                if to != END && !self.steps.contains_key(to) {
                    return Err(GraphError::DanglingEdge {
                        from: from.clone(),
                        to: to.to_string(),
                        missing: to.to_string(),
                    });
                }
            }
            if !sources.insert(from.as_str()) {
                return Err(GraphError::ConflictingEdges(from.clone()));
            }
        }

        if !sources.contains(START) {
            return Err(GraphError::NoEntryPoint(self.name.clone()));
        }

        if let Some(name) = self.order.iter().find(|n| !sources.contains(n.as_str())) {
            return Err(GraphError::MissingOutgoingEdge(name.clone()));
        }

        let reachable = self.reachable();
        for name in self.order.iter().filter(|n| !reachable.contains(n.as_str())) {
            log::warn!("Step '{}' in graph '{}' is unreachable from START", name, self.name);
        }

        Ok(())
    }

    fn reachable(&self) -> HashSet<&str> {
        let edges: HashMap<&str, &Edge> = self.edges.iter().map(|(f, e)| (f.as_str(), e)).collect();
        let mut seen = HashSet::new();
        let mut stack = vec![START];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            if let Some(edge) = edges.get(node) {
                stack.extend(edge.targets());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetic::workflow::graph::types::step_fn;
    use crate::kinetic::workflow::state::StateUpdate;

    fn noop() -> impl Step {
        step_fn(|_| async { Ok(StateUpdate::new()) })
    }

    #[test]
    fn test_compile_linear_graph() {
        let graph = StateGraph::new("linear", StateSchema::new())
            .add_step("a", noop())
            .add_step("b", noop())
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .compile()
            .unwrap();

        assert_eq!(graph.name(), "linear");
        assert_eq!(graph.step_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_step_fails() {
        let err = StateGraph::new("dup", StateSchema::new())
            .add_step("a", noop())
            .add_step("a", noop())
            .add_edge(START, "a")
            .add_edge("a", END)
            .compile()
            .unwrap_err();

        assert_eq!(err, GraphError::DuplicateStep("a".to_string()));
    }

    #[test]
    fn test_dangling_edge_fails() {
        let err = StateGraph::new("dangling", StateSchema::new())
            .add_step("a", noop())
            .add_edge(START, "a")
            .add_edge("a", "ghost")
            .compile()
            .unwrap_err();

        assert_eq!(
            err,
            GraphError::DanglingEdge {
                from: "a".to_string(),
                to: "ghost".to_string(),
                missing: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_dangling_router_target_fails() {
        let err = StateGraph::new("dangling", StateSchema::new())
            .add_step("a", noop())
            .add_edge(START, "a")
            .add_conditional_edge("a", |_| "x".to_string(), [("x", END), ("y", "nowhere")])
            .compile()
            .unwrap_err();

        assert!(matches!(err, GraphError::DanglingEdge { missing, .. } if missing == "nowhere"));
    }

    #[test]
    fn test_edge_from_unknown_source_fails() {
        let err = StateGraph::new("dangling", StateSchema::new())
            .add_step("a", noop())
            .add_edge(START, "a")
            .add_edge("a", END)
            .add_edge("ghost", "a")
            .compile()
            .unwrap_err();

        assert!(matches!(err, GraphError::DanglingEdge { missing, .. } if missing == "ghost"));
    }

    #[test]
    fn test_missing_entry_point_fails() {
        let err = StateGraph::new("no-entry", StateSchema::new())
            .add_step("a", noop())
            .add_edge("a", END)
            .compile()
            .unwrap_err();

        assert_eq!(err, GraphError::NoEntryPoint("no-entry".to_string()));
    }

    #[test]
    fn test_reserved_name_fails() {
        let err = StateGraph::new("reserved", StateSchema::new())
            .add_step(END, noop())
            .add_edge(START, END)
            .compile()
            .unwrap_err();

        assert_eq!(err, GraphError::ReservedName(END.to_string()));
    }

    #[test]
    fn test_two_outgoing_edges_fail() {
        let err = StateGraph::new("conflict", StateSchema::new())
            .add_step("a", noop())
            .add_step("b", noop())
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("a", END)
            .add_edge("b", END)
            .compile()
            .unwrap_err();

        assert_eq!(err, GraphError::ConflictingEdges("a".to_string()));
    }

    #[test]
    fn test_step_without_edge_fails() {
        let err = StateGraph::new("stuck", StateSchema::new())
            .add_step("a", noop())
            .add_step("b", noop())
            .add_edge(START, "a")
            .add_edge("a", END)
            .compile()
            .unwrap_err();

        assert_eq!(err, GraphError::MissingOutgoingEdge("b".to_string()));
    }

    #[test]
    fn test_router_allow_list_need_not_be_exhaustive() {
        // Router may produce keys with no route; that is a run-time concern
        let graph = StateGraph::new("partial", StateSchema::new())
            .add_step("a", noop())
            .add_edge(START, "a")
            .add_conditional_edge("a", |_| "unmapped".to_string(), [("done", END)])
            .compile();

        assert!(graph.is_ok());
    }
}
