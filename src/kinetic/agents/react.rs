// SPDX-License-Identifier: MIT

//! ReAct tool loop
//!
//! `llm_call` asks the model for the next move; when the reply requests tool
//! calls, `tool_call` runs them and hands the results back to `llm_call`.
//! Conversation history lives in the append-reduced `messages` field and is
//! carried between turns by the checkpointer.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use crate::adk::error::{BoxError, GraphError, RunError};
use crate::adk::model::{Content, Model, Role};
use crate::adk::tool::Tool;
use crate::kinetic::workflow::checkpoint::Checkpointer;
use crate::kinetic::workflow::graph::{
    CompiledGraph, ExecutorConfig, RunConfig, StateGraph, Step, END, START,
};
use crate::kinetic::workflow::registry::ToolRegistry;
use crate::kinetic::workflow::state::{
    FieldType, ReducerType, StateFieldDef, StateSchema, StateUpdate, WorkflowState,
};

pub const LLM_STEP: &str = "llm_call";
pub const TOOL_STEP: &str = "tool_call";

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant. Use the available tools whenever they give you \
information you do not have, such as the current time or the content of a file. \
Base your answers on tool results rather than guesses.";

pub fn react_schema() -> StateSchema {
    StateSchema::new()
        .field(
            "messages",
            StateFieldDef::new(FieldType::Array).reducer(ReducerType::Append),
        )
        .field("llm_calls", StateFieldDef::new(FieldType::Number))
        .field("tool_calls", StateFieldDef::new(FieldType::Number))
}

fn messages(state: &WorkflowState) -> Vec<Content> {
    state.get_as("messages").unwrap_or_default()
}

struct LlmCallStep {
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
    system_prompt: String,
}

#[async_trait]
impl Step for LlmCallStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let mut history = vec![Content::system(self.system_prompt.clone())];
        history.extend(messages(state));

        let reply = self
            .model
            .generate_content(&history, None, Some(&self.tools))
            .await?;
        log::debug!("{} requested {} tool calls", LLM_STEP, reply.function_calls().len());

        Ok(StateUpdate::new()
            .set("messages", json!([serde_json::to_value(&reply)?]))
            .set("llm_calls", state.get_u64("llm_calls").unwrap_or(0) + 1))
    }
}

struct ToolCallStep {
    registry: ToolRegistry,
}

#[async_trait]
impl Step for ToolCallStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let history = messages(state);
        let Some(last) = history.last() else {
            return Ok(StateUpdate::new());
        };

        let mut results = Vec::new();
        for (id, name, args) in last.function_calls() {
            log::info!("Calling tool {}({})", name, args);
            let response = match self.registry.execute(name, args.clone()).await {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Tool {} failed: {}", name, e);
                    json!(format!("Error: {e}"))
                }
            };
            results.push(serde_json::to_value(Content::tool_result(id, name, response))?);
        }

        let count = results.len() as u64;
        Ok(StateUpdate::new()
            .set("messages", results)
            .set("tool_calls", state.get_u64("tool_calls").unwrap_or(0) + count))
    }
}

/// `tool_call` when the last model reply asked for tools, otherwise `end`
pub fn route_after_llm(state: &WorkflowState) -> String {
    let wants_tools = messages(state)
        .last()
        .map(|m| m.role == Role::Model && !m.function_calls().is_empty())
        .unwrap_or(false);
    if wants_tools {
        TOOL_STEP.to_string()
    } else {
        "end".to_string()
    }
}

pub async fn build_react_graph(
    model: Arc<dyn Model>,
    registry: ToolRegistry,
    system_prompt: impl Into<String>,
    config: ExecutorConfig,
    checkpointer: Option<Arc<dyn Checkpointer>>,
) -> Result<CompiledGraph, GraphError> {
    let tools = registry.list().await;
    StateGraph::new("react", react_schema())
        .add_step(
            LLM_STEP,
            LlmCallStep {
                model,
                tools,
                system_prompt: system_prompt.into(),
            },
        )
        .add_step(TOOL_STEP, ToolCallStep { registry })
        .add_edge(START, LLM_STEP)
        .add_conditional_edge(
            LLM_STEP,
            route_after_llm,
            [(TOOL_STEP, TOOL_STEP), ("end", END)],
        )
        .add_edge(TOOL_STEP, LLM_STEP)
        .compile_with(config, checkpointer)
}

/// Chat agent with per-thread memory
#[derive(Clone)]
pub struct ReActAgent {
    graph: CompiledGraph,
}

impl ReActAgent {
    pub async fn new(
        model: Arc<dyn Model>,
        registry: ToolRegistry,
        config: ExecutorConfig,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Result<Self, GraphError> {
        let graph =
            build_react_graph(model, registry, DEFAULT_SYSTEM_PROMPT, config, Some(checkpointer))
                .await?;
        Ok(Self { graph })
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    /// Send one user turn on `thread_id` and return the model's final text
    pub async fn chat(&self, thread_id: &str, input: &str) -> Result<String, RunError> {
        let input = StateUpdate::new().set("messages", json!([Content::user(input)]));
        let state = self
            .graph
            .run_with(input, &RunConfig::thread(thread_id))
            .await?;

        Ok(messages(&state)
            .last()
            .map(Content::text)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::ToolError;
    use crate::adk::model::Part;
    use crate::kinetic::agents::mock::MockModel;
    use crate::kinetic::workflow::checkpoint::InMemoryCheckpointer;
    use once_cell::sync::Lazy;
    use serde_json::Value;

    static MOCK_TOOL_SCHEMA: Lazy<Value> =
        Lazy::new(|| json!({"type": "object", "properties": {"query": {"type": "string"}}}));

    struct MockTool;

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "Mock lookup"
        }
        fn schema(&self) -> &Value {
            &MOCK_TOOL_SCHEMA
        }
        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            match args["query"].as_str() {
                Some(q) => Ok(json!(format!("found {q}"))),
                None => Err(ToolError::Failed("query missing".to_string())),
            }
        }
    }

    fn call(id: &str, name: &str, args: Value) -> Content {
        Content::new(
            Role::Model,
            vec![Part::FunctionCall {
                id: id.to_string(),
                name: name.to_string(),
                args,
            }],
        )
    }

    async fn agent(replies: Vec<Content>) -> (ReActAgent, Arc<MockModel>, Arc<InMemoryCheckpointer>) {
        let model = Arc::new(MockModel::new(replies));
        let registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool)).await;
        let store = Arc::new(InMemoryCheckpointer::new());
        let agent = ReActAgent::new(model.clone(), registry, ExecutorConfig::default(), store.clone())
            .await
            .unwrap();
        (agent, model, store)
    }

    #[tokio::test]
    async fn test_tool_result_flows_back_to_model() {
        let (agent, model, store) = agent(vec![
            call("c1", "lookup", json!({"query": "rust"})),
            Content::model("Rust is a language."),
        ])
        .await;

        let answer = agent.chat("t1", "What is rust?").await.unwrap();
        assert_eq!(answer, "Rust is a language.");

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let tool_msg = requests[1].last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(
            tool_msg.parts[0],
            Part::FunctionResponse {
                id: "c1".to_string(),
                name: "lookup".to_string(),
                response: json!("found rust"),
            }
        );

        let latest = store.load("t1").await.unwrap().unwrap();
        assert_eq!(latest.state["llm_calls"], 2);
        assert_eq!(latest.state["tool_calls"], 1);
        assert_eq!(latest.state["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_tool_errors_become_messages() {
        let (agent, model, _) = agent(vec![
            Content::new(
                Role::Model,
                vec![
                    Part::FunctionCall {
                        id: "a".to_string(),
                        name: "teleport".to_string(),
                        args: json!({}),
                    },
                    Part::FunctionCall {
                        id: "b".to_string(),
                        name: "lookup".to_string(),
                        args: json!({}),
                    },
                ],
            ),
            Content::model("Sorry."),
        ])
        .await;

        assert_eq!(agent.chat("t", "go").await.unwrap(), "Sorry.");

        let requests = model.requests.lock().unwrap();
        let second = &requests[1];
        let results: Vec<String> = second
            .iter()
            .filter(|m| m.role == Role::Tool)
            .map(|m| match &m.parts[0] {
                Part::FunctionResponse { response, .. } => response.as_str().unwrap().to_string(),
                other => panic!("unexpected part {other:?}"),
            })
            .collect();
        assert_eq!(
            results,
            vec!["Error: Tool 'teleport' not found", "Error: query missing"]
        );
    }

    #[tokio::test]
    async fn test_thread_memory_carries_history() {
        let (agent, model, _) = agent(vec![
            Content::model("Hi Ada."),
            Content::model("Your name is Ada."),
            Content::model("Hello stranger."),
        ])
        .await;

        agent.chat("ada", "I am Ada").await.unwrap();
        agent.chat("ada", "What is my name?").await.unwrap();
        agent.chat("other", "Who am I?").await.unwrap();

        let requests = model.requests.lock().unwrap();
        // system + user + model + user
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][1].text(), "I am Ada");
        // a fresh thread sees only its own turn
        assert_eq!(requests[2].len(), 2);
    }

    #[test]
    fn test_route_after_llm() {
        let schema = Arc::new(react_schema());
        let state = WorkflowState::new(schema)
            .merge(&StateUpdate::new().set(
                "messages",
                json!([serde_json::to_value(call("x", "lookup", json!({}))).unwrap()]),
            ))
            .unwrap();
        assert_eq!(route_after_llm(&state), TOOL_STEP);

        let done = state
            .merge(&StateUpdate::new().set(
                "messages",
                json!([serde_json::to_value(Content::model("ok")).unwrap()]),
            ))
            .unwrap();
        assert_eq!(route_after_llm(&done), "end");
    }
}
