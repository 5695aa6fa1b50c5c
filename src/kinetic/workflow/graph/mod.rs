// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! Steps are registered on a [`StateGraph`], validated by `compile()` into a
//! [`CompiledGraph`], and executed from START to END with per-field reducers
//! merging each step's update into the shared state.

pub mod builder;
pub mod executor;
mod mermaid;
pub mod types;

pub use builder::{StateGraph, UNCLASSIFIED};
pub use executor::{CompiledGraph, ExecutorConfig, GraphEvent, RunConfig};
pub use types::{step_fn, Edge, RouteTable, RouterFn, Step, StepFn, END, START};
