// SPDX-License-Identifier: MIT

//! Graph workflow type definitions
//!
//! Steps, edges, routers and route tables shared by the builder and executor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::adk::error::BoxError;
use crate::kinetic::workflow::state::{StateUpdate, WorkflowState};

/// Virtual source of every graph; has no step body
pub const START: &str = "__start__";

/// Virtual sink; reaching it ends the run
pub const END: &str = "__end__";

/// A named unit of work
///
/// A step receives the fully merged state and returns only the fields it
/// changes. Steps are registered once and never mutated afterwards, so
/// implementations must be shareable across concurrent runs.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError>;
}

/// Adapter turning an async closure into a [`Step`]
///
/// The closure receives an owned snapshot of the state.
pub struct StepFn<F>(F);

/// Wrap an async closure as a step
pub fn step_fn<F, Fut>(f: F) -> StepFn<F>
where
    F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate, BoxError>> + Send + 'static,
{
    StepFn(f)
}

#[async_trait]
impl<F, Fut> Step for StepFn<F>
where
    F: Fn(WorkflowState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate, BoxError>> + Send + 'static,
{
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        (self.0)(state.clone()).await
    }
}

/// Picks the next route key from the post-merge state
pub type RouterFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// Outgoing edge of a step (or of START)
#[derive(Clone)]
pub enum Edge {
    /// Always continue with `target`
    Fixed(String),
    /// Ask the router, then look its answer up in `routes`
    Conditional {
        router: RouterFn,
        /// Router return value -> target step name
        routes: HashMap<String, String>,
    },
}

impl Edge {
    /// Every target this edge can lead to
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Fixed(target) => vec![target.as_str()],
            Edge::Conditional { routes, .. } => {
                let mut targets: Vec<&str> = routes.values().map(String::as_str).collect();
                targets.sort_unstable();
                targets.dedup();
                targets
            }
        }
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Fixed(target) => f.debug_tuple("Fixed").field(target).finish(),
            Edge::Conditional { routes, .. } => f
                .debug_struct("Conditional")
                .field("routes", routes)
                .finish_non_exhaustive(),
        }
    }
}

/// A closed set of classification values and the step each one leads to
///
/// Implemented by enums so that the router and the compiled allow-list are
/// derived from the same declaration and cannot drift apart.
pub trait RouteTable: Copy + Send + Sync + 'static {
    /// All classification values
    fn variants() -> &'static [Self];

    /// Key the router returns for this value
    fn key(self) -> &'static str;

    /// Step (or END) this value routes to
    fn target(self) -> &'static str;

    /// Allow-list for a conditional edge built from this table
    fn routes() -> HashMap<String, String> {
        Self::variants()
            .iter()
            .map(|v| (v.key().to_string(), v.target().to_string()))
            .collect()
    }
}
