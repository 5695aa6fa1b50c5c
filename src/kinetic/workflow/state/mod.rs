// SPDX-License-Identifier: MIT

//! State management for graph workflows
//!
//! This module provides:
//! - `StateSchema` - defines the shape and types of workflow state
//! - `WorkflowState` - runtime state storage with reducer support
//! - `StateUpdate` - the partial record a step hands back

mod schema;
mod store;

pub use schema::{CustomReducer, FieldType, ReducerType, StateFieldDef, StateSchema};
pub use store::{StateUpdate, WorkflowState};
