// SPDX-License-Identifier: MIT

//! Plan-execute-evaluate workflow
//!
//! `plan_llm_call` breaks a goal into tasks, `worker_llm_call` runs once per
//! task driven by the `current_step` cursor, and `final_llm_call` summarizes
//! the completed work.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::adk::error::{BoxError, GraphError, RunError};
use crate::adk::model::{generate_structured, Content, Model};
use crate::kinetic::workflow::graph::{
    CompiledGraph, ExecutorConfig, GraphEvent, StateGraph, Step, END, START,
};
use crate::kinetic::workflow::state::{
    FieldType, ReducerType, StateFieldDef, StateSchema, StateUpdate, WorkflowState,
};

pub const PLAN_STEP: &str = "plan_llm_call";
pub const WORKER_STEP: &str = "worker_llm_call";
pub const FINAL_STEP: &str = "final_llm_call";

/// One executable task of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskStep {
    /// Unique id in the form `task_{index}`, e.g. `task_0`
    pub task_id: String,
    /// Short task name
    pub task_name: String,
    /// Concrete, executable description of the task
    pub desc: String,
}

/// Structured output of the planning call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanModel {
    /// The user's goal, restated
    pub user_goal: String,
    /// Ordered task list
    pub tasks: Vec<TaskStep>,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("The model returned a plan without tasks")]
    EmptyPlan,

    #[error("No task at step {0}")]
    MissingTask(u64),
}

pub fn plan_schema() -> StateSchema {
    StateSchema::new()
        .field("user_content", StateFieldDef::new(FieldType::String))
        .field("tasks", StateFieldDef::new(FieldType::Array))
        .field("current_step", StateFieldDef::new(FieldType::Number))
        .field("current_task", StateFieldDef::new(FieldType::Object).nullable())
        .field(
            "completed_tasks",
            StateFieldDef::new(FieldType::Array).reducer(ReducerType::Append),
        )
        .field("final_res", StateFieldDef::new(FieldType::String))
}

const PLAN_PROMPT: &str = "\
# Role
You are a world-class planner who turns complex goals into executable plans.

# Task breakdown rules
1. Atomicity: every task is a minimal unit that cannot be split further.
2. Coverage: together, the tasks must fully achieve the user's goal.";

const FINAL_PROMPT: &str = "\
# Role
You evaluate a completed plan. Summarize the results of the finished tasks \
into a single coherent answer for the user.";

struct PlanStep {
    model: Arc<dyn Model>,
}

#[async_trait]
impl Step for PlanStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let goal = state.get_str("user_content").unwrap_or_default();
        log::info!("{}: {}", PLAN_STEP, goal);

        let plan: PlanModel = generate_structured(
            self.model.as_ref(),
            PLAN_STEP,
            &[
                Content::system(PLAN_PROMPT),
                Content::user(format!("Plan the following goal: {goal}")),
            ],
        )
        .await?;

        if plan.tasks.is_empty() {
            return Err(PlanError::EmptyPlan.into());
        }

        Ok(StateUpdate::new()
            .set("tasks", serde_json::to_value(&plan.tasks)?)
            .set("current_step", 0))
    }
}

struct WorkerStep {
    model: Arc<dyn Model>,
}

#[async_trait]
impl Step for WorkerStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let current_step = state.get_u64("current_step").unwrap_or(0);
        let tasks: Vec<TaskStep> = state.get_as("tasks").unwrap_or_default();
        let task = tasks
            .get(current_step as usize)
            .ok_or(PlanError::MissingTask(current_step))?;

        log::info!("{} [{}]: {}", WORKER_STEP, current_step, task.task_name);

        let prompt = format!(
            "# Role\nYou are an assistant that executes exactly one task.\n\n\
             # Overall goal\n{}\n\n\
             # Current task\nId: {}\nName: {}\nDescription: {}\n\n\
             # Requirements\nCarry out only the current task and do not work on other tasks.",
            state.get_str("user_content").unwrap_or_default(),
            task.task_id,
            task.task_name,
            task.desc
        );

        let reply = self
            .model
            .generate_content(&[Content::user(prompt)], None, None)
            .await?;

        Ok(StateUpdate::new()
            .set("completed_tasks", json!([reply.text()]))
            .set("current_step", current_step + 1)
            .set("current_task", serde_json::to_value(task)?))
    }
}

struct FinalStep {
    model: Arc<dyn Model>,
}

#[async_trait]
impl Step for FinalStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let completed = state.get("completed_tasks").cloned().unwrap_or(Value::Null);
        log::info!(
            "{}: evaluating {} completed tasks",
            FINAL_STEP,
            state.len_of("completed_tasks")
        );

        let reply = self
            .model
            .generate_content(
                &[
                    Content::system(FINAL_PROMPT),
                    Content::user(format!("Completed task results: {completed}")),
                ],
                None,
                None,
            )
            .await?;

        Ok(StateUpdate::new().set("final_res", reply.text()))
    }
}

/// Continue with the worker while tasks remain
pub fn route_after_worker(state: &WorkflowState) -> String {
    let current = state.get_u64("current_step").unwrap_or(0) as usize;
    if current < state.len_of("tasks") {
        WORKER_STEP.to_string()
    } else {
        FINAL_STEP.to_string()
    }
}

pub fn build_plan_graph(
    model: Arc<dyn Model>,
    config: ExecutorConfig,
) -> Result<CompiledGraph, GraphError> {
    StateGraph::new("plan", plan_schema())
        .add_step(PLAN_STEP, PlanStep { model: model.clone() })
        .add_step(WORKER_STEP, WorkerStep { model: model.clone() })
        .add_step(FINAL_STEP, FinalStep { model })
        .add_edge(START, PLAN_STEP)
        .add_edge(PLAN_STEP, WORKER_STEP)
        .add_conditional_edge(
            WORKER_STEP,
            route_after_worker,
            [(WORKER_STEP, WORKER_STEP), (FINAL_STEP, FINAL_STEP)],
        )
        .add_edge(FINAL_STEP, END)
        .compile_with(config, None)
}

/// Progress record emitted while a plan runs
///
/// Serializes to `{node, status, data}` per step and `{status: "finished"}`
/// at the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl PlanProgress {
    pub fn finished() -> Self {
        Self {
            node: None,
            status: "finished".to_string(),
            data: None,
        }
    }

    fn completed(node: &str, data: Value) -> Self {
        Self {
            node: Some(node.to_string()),
            status: "completed".to_string(),
            data: Some(data),
        }
    }

    /// Progress payload for one step update; `None` for updates with nothing to report
    fn from_step(step: &str, update: &StateUpdate) -> Option<Self> {
        match step {
            PLAN_STEP => {
                let tasks = update.get("tasks")?.as_array()?;
                Some(Self::completed(
                    step,
                    json!({ "tasks_count": tasks.len(), "tasks": tasks }),
                ))
            }
            WORKER_STEP => {
                let result = update.get("completed_tasks")?.as_array()?.last()?.clone();
                let next = update.get("current_step")?.as_u64()?;
                Some(Self::completed(
                    step,
                    json!({ "step": next.saturating_sub(1), "result": result }),
                ))
            }
            FINAL_STEP => {
                let final_result = update.get("final_res")?;
                Some(Self::completed(step, json!({ "final_result": final_result })))
            }
            _ => None,
        }
    }
}

/// Plan agent wrapping the compiled plan graph
#[derive(Clone)]
pub struct PlanAgent {
    graph: CompiledGraph,
}

impl PlanAgent {
    pub fn new(model: Arc<dyn Model>, config: ExecutorConfig) -> Result<Self, GraphError> {
        Ok(Self {
            graph: build_plan_graph(model, config)?,
        })
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Run the whole plan and return the final state
    pub async fn invoke(&self, goal: &str) -> Result<WorkflowState, RunError> {
        self.graph
            .run(StateUpdate::new().set("user_content", goal))
            .await
    }

    /// Run the plan, yielding progress after every step
    pub fn stream(
        &self,
        goal: &str,
    ) -> impl Stream<Item = Result<PlanProgress, RunError>> + Send + 'static {
        self.graph
            .stream(StateUpdate::new().set("user_content", goal))
            .filter_map(|event| async move {
                match event {
                    Ok(GraphEvent::Step { step, update }) => {
                        PlanProgress::from_step(&step, &update).map(Ok)
                    }
                    Ok(GraphEvent::Finished { .. }) => Some(Ok(PlanProgress::finished())),
                    Err(e) => Some(Err(e)),
                }
            })
    }
}
