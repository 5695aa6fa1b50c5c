// SPDX-License-Identifier: MIT

//! Stateful step graphs for LLM agent workflows
//!
//! [`kinetic::workflow`] holds the engine: state with per-field reducers,
//! the graph builder and its batch/streaming executor. [`kinetic::agents`]
//! wires the engine into the plan, complaint and ReAct workflows; [`adk`]
//! defines the model and tool seams they depend on.

pub mod adk;
pub mod kinetic;
