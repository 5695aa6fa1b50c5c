// SPDX-License-Identifier: MIT

//! Workflow instantiations built on the graph engine
//!
//! - [`plan`] - plan, execute each task, evaluate
//! - [`complaint`] - classify a complaint, route to a desk, reply, notify
//! - [`react`] - model/tool loop with conversation memory

pub mod complaint;
pub mod plan;
pub mod react;

pub use complaint::{ComplaintAgent, ComplaintBranch, ComplaintLevel, ComplaintOutcome, ComplaintType};
pub use plan::{PlanAgent, PlanError, PlanModel, PlanProgress, TaskStep};
pub use react::ReActAgent;
