//! Integration tests for the workflow engine and the agents built on it
//!
//! These tests drive whole graphs end to end with mock collaborators.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use kinetic_graph::adk::error::{GraphError, ModelError, RunError, ToolError};
use kinetic_graph::adk::model::{Content, GenerationConfig, Model, Part, Role};
use kinetic_graph::adk::tool::Tool;
use kinetic_graph::kinetic::agents::{
    ComplaintAgent, ComplaintBranch, ComplaintType, PlanAgent, PlanProgress, ReActAgent,
};
use kinetic_graph::kinetic::cli::run_chat_loop;
use kinetic_graph::kinetic::server::{router, AppState};
use kinetic_graph::kinetic::tools::{default_registry, resolve_within, SearchConfig};
use kinetic_graph::kinetic::workflow::checkpoint::InMemoryCheckpointer;
use kinetic_graph::kinetic::workflow::graph::{
    step_fn, ExecutorConfig, GraphEvent, RouteTable, StateGraph, END, START,
};
use kinetic_graph::kinetic::workflow::state::{
    FieldType, ReducerType, StateFieldDef, StateSchema, StateUpdate, WorkflowState,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Mock Components
// ============================================================================

type Responder = dyn Fn(&[Content]) -> Content + Send + Sync;

/// Mock model answering through a closure over the request history
struct MockModel {
    respond: Box<Responder>,
    calls: AtomicUsize,
}

impl MockModel {
    fn new(respond: impl Fn(&[Content]) -> Content + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        })
    }

    /// Replies in order, then "Max responses reached"
    fn scripted(replies: Vec<Content>) -> Arc<Self> {
        let index = AtomicUsize::new(0);
        Self::new(move |_| {
            let i = index.fetch_add(1, Ordering::SeqCst);
            replies
                .get(i)
                .cloned()
                .unwrap_or_else(|| Content::model("Max responses reached"))
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_content(
        &self,
        history: &[Content],
        _config: Option<&GenerationConfig>,
        _tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.respond)(history))
    }
}

fn wants_json(history: &[Content]) -> bool {
    history
        .first()
        .map(|m| m.text().contains("JSON schema"))
        .unwrap_or(false)
}

/// Plan model: `n` tasks, one reply per worker, then a summary
fn planner(n: usize) -> Arc<MockModel> {
    MockModel::new(move |history| {
        if wants_json(history) {
            let tasks: Vec<Value> = (0..n)
                .map(|i| json!({"task_id": format!("task_{i}"), "task_name": format!("Task {i}"), "desc": format!("Do step {i}")}))
                .collect();
            return Content::model(json!({"user_goal": "goal", "tasks": tasks}).to_string());
        }
        let prompt = history.last().map(Content::text).unwrap_or_default();
        if prompt.starts_with("Completed task results") {
            Content::model("All done")
        } else {
            let id = prompt
                .split_whitespace()
                .find(|w| w.starts_with("task_"))
                .unwrap_or("?")
                .to_string();
            Content::model(format!("result of {id}"))
        }
    })
}

fn complaint_model(kind: ComplaintType, level: &'static str) -> Arc<MockModel> {
    MockModel::new(move |history| {
        if wants_json(history) {
            Content::model(format!(r#"{{"type": "{}", "level": "{}"}}"#, kind.as_str(), level))
        } else {
            Content::model("Dear customer, we are on it.")
        }
    })
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("kinetic-it-{}", uuid::Uuid::new_v4()))
}

// ============================================================================
// Engine
// ============================================================================

#[tokio::test]
async fn test_append_preserves_execution_order() {
    let schema = StateSchema::new().field(
        "trail",
        StateFieldDef::new(FieldType::Array).reducer(ReducerType::Append),
    );
    let mut graph = StateGraph::new("abc", schema);
    for name in ["A", "B", "C"] {
        graph = graph.add_step(
            name,
            step_fn(move |_| async move { Ok(StateUpdate::new().set("trail", json!([name]))) }),
        );
    }
    let graph = graph
        .add_edge(START, "A")
        .add_edge("A", "B")
        .add_edge("B", "C")
        .add_edge("C", END)
        .compile()
        .unwrap();

    let state = graph.run(StateUpdate::new()).await.unwrap();
    assert_eq!(state.get("trail"), Some(&json!(["A", "B", "C"])));
}

#[tokio::test]
async fn test_schema_less_state_is_last_writer_wins() {
    let graph = StateGraph::new("plain", StateSchema::new())
        .add_step(
            "a",
            step_fn(|_| async { Ok(StateUpdate::new().set("x", 1).set("y", "kept")) }),
        )
        .add_step(
            "b",
            step_fn(|_| async { Ok(StateUpdate::new().set("x", 2).set("y", Value::Null)) }),
        )
        .add_edge(START, "a")
        .add_edge("a", "b")
        .add_edge("b", END)
        .compile()
        .unwrap();

    let state = graph.run(StateUpdate::new()).await.unwrap();
    assert_eq!(state.get("x"), Some(&json!(2)));
    assert_eq!(state.get("y"), Some(&json!("kept")));
}

#[tokio::test]
async fn test_step_sees_fully_merged_state() {
    let schema = StateSchema::new()
        .field("best", StateFieldDef::new(FieldType::Number).reducer(ReducerType::Max))
        .field("meta", StateFieldDef::new(FieldType::Object).reducer(ReducerType::Merge));
    let graph = StateGraph::new("merged", schema)
        .add_step(
            "first",
            step_fn(|_| async {
                Ok(StateUpdate::new()
                    .set("best", 7)
                    .set("meta", json!({"a": 1})))
            }),
        )
        .add_step(
            "second",
            step_fn(|state: WorkflowState| async move {
                assert_eq!(state.get("meta"), Some(&json!({"a": 1})));
                Ok(StateUpdate::new()
                    .set("best", 3)
                    .set("meta", json!({"b": 2})))
            }),
        )
        .add_edge(START, "first")
        .add_edge("first", "second")
        .add_edge("second", END)
        .compile()
        .unwrap();

    let state = graph.run(StateUpdate::new()).await.unwrap();
    assert_eq!(state.get("best"), Some(&json!(7)));
    assert_eq!(state.get("meta"), Some(&json!({"a": 1, "b": 2})));
}

#[test]
fn test_dangling_edge_fails_at_compile_time() {
    let err = StateGraph::new("broken", StateSchema::new())
        .add_step("a", step_fn(|_| async { Ok(StateUpdate::new()) }))
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

// ============================================================================
// Plan workflow
// ============================================================================

#[tokio::test]
async fn test_plan_with_three_tasks() {
    let model = planner(3);
    let agent = PlanAgent::new(model.clone(), ExecutorConfig::default()).unwrap();

    let state = agent.invoke("get fit").await.unwrap();

    // plan + 3 workers + evaluate
    assert_eq!(model.calls(), 5);
    assert_eq!(
        state.get("completed_tasks"),
        Some(&json!(["result of task_0", "result of task_1", "result of task_2"]))
    );
    assert_eq!(state.get_u64("current_step"), Some(3));
    assert_eq!(state.get_str("final_res"), Some("All done"));
}

#[tokio::test]
async fn test_plan_stream_matches_batch() {
    let agent = PlanAgent::new(planner(2), ExecutorConfig::default()).unwrap();
    let batch = agent.invoke("goal").await.unwrap();

    let mut folded = WorkflowState::new(agent.graph().schema().clone())
        .merge(&StateUpdate::new().set("user_content", "goal"))
        .unwrap();
    let mut events = Box::pin(agent.graph().stream(StateUpdate::new().set("user_content", "goal")));
    let mut finished = false;
    while let Some(event) = events.next().await {
        match event.unwrap() {
            GraphEvent::Step { update, .. } => folded = folded.merge(&update).unwrap(),
            GraphEvent::Finished { state } => {
                assert_eq!(state, batch);
                finished = true;
            }
        }
    }
    assert!(finished);
    assert_eq!(folded, batch);
}

#[tokio::test]
async fn test_plan_iteration_limit() {
    let agent = PlanAgent::new(planner(10), ExecutorConfig::with_max_iterations(4)).unwrap();
    let err = agent.invoke("too much").await.unwrap_err();
    assert!(matches!(err, RunError::IterationLimitExceeded { limit: 4 }));
}

#[tokio::test]
async fn test_plan_stream_progress_payloads() {
    let agent = PlanAgent::new(planner(1), ExecutorConfig::default()).unwrap();
    let events: Vec<Value> = agent
        .stream("goal")
        .map(|e| serde_json::to_value(e.unwrap()).unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["node"], "plan_llm_call");
    assert_eq!(events[0]["status"], "completed");
    assert_eq!(
        events[1],
        json!({"node": "worker_llm_call", "status": "completed", "data": {"step": 0, "result": "result of task_0"}})
    );
    assert_eq!(events[2]["data"]["final_result"], "All done");
    assert_eq!(events[3], serde_json::to_value(PlanProgress::finished()).unwrap());
}

// ============================================================================
// Complaint workflow
// ============================================================================

#[tokio::test]
async fn test_every_complaint_type_reaches_its_branch() {
    for kind in ComplaintType::ALL {
        let agent = ComplaintAgent::new(complaint_model(kind, "MEDIUM"), ExecutorConfig::default())
            .unwrap();
        let outcome = agent.handle("title", "description").await.unwrap();

        assert_eq!(outcome.complaint_type, kind);
        assert_eq!(outcome.branch, kind.branch());
        assert_eq!(outcome.response_deadline, "3 working days");
        assert!(!outcome.needs_human_review);
    }
}

#[test]
fn test_route_table_covers_all_types() {
    let routes = ComplaintType::routes();
    let expected = [
        ("CARD_BUSINESS", "business"),
        ("LOAN_BUSINESS", "business"),
        ("PAYMENT_SETTLEMENT", "business"),
        ("FINANCIAL_MANAGEMENT", "business"),
        ("SERVICE_ATTITUDE", "service"),
        ("SERVICE_QUALITY", "service"),
        ("MARKETING_SALES", "service"),
        ("FEE_PRICING", "service"),
        ("POLICY_PROCESS", "process"),
        ("INFORMATION_DISCLOSURE", "security"),
        ("OTHER", "other"),
    ];
    assert_eq!(routes.len(), expected.len());
    for (key, branch) in expected {
        assert_eq!(routes[key], branch);
    }
}

#[tokio::test]
async fn test_emergency_complaint_needs_review() {
    let model = complaint_model(ComplaintType::InformationDisclosure, "EMERGENCY");
    let agent = ComplaintAgent::new(model.clone(), ExecutorConfig::default()).unwrap();
    let outcome = agent.handle("Data leak", "My data was exposed").await.unwrap();

    assert_eq!(outcome.branch, ComplaintBranch::Security);
    assert_eq!(outcome.response_deadline, "2 hours");
    assert!(outcome.needs_human_review);
    assert_eq!(outcome.reply, "Dear customer, we are on it.");
    // classifier + reply
    assert_eq!(model.calls(), 2);
}

#[test]
fn test_complaint_graph_diagram() {
    let model = complaint_model(ComplaintType::Other, "LOW");
    let agent = ComplaintAgent::new(model, ExecutorConfig::default()).unwrap();
    let chart = agent.graph().to_mermaid();

    assert!(chart.contains("intent -.->|CARD_BUSINESS| business"));
    assert!(chart.contains("intent -.->|OTHER| other"));
    assert!(chart.contains("notify --> END"));
}

// ============================================================================
// ReAct workflow with real tools
// ============================================================================

#[tokio::test]
async fn test_react_reads_file_through_tool() {
    let base = scratch_dir();
    std::fs::create_dir_all(base.join("docs")).unwrap();
    std::fs::write(base.join("docs/readme.txt"), "kinetic").unwrap();

    let model = MockModel::scripted(vec![
        Content::new(
            Role::Model,
            vec![Part::FunctionCall {
                id: "c1".to_string(),
                name: "read_file".to_string(),
                args: json!({"filename": "docs/readme.txt"}),
            }],
        ),
        Content::model("The file says kinetic."),
    ]);
    let registry = default_registry(&base, &SearchConfig::default()).await;
    let store = Arc::new(InMemoryCheckpointer::new());
    let agent = ReActAgent::new(model, registry, ExecutorConfig::default(), store.clone())
        .await
        .unwrap();

    let answer = agent.chat("t1", "What is in the readme?").await.unwrap();
    assert_eq!(answer, "The file says kinetic.");

    let history = store.history("t1").await;
    let tool_msg = &history.last().unwrap().state["messages"][2];
    assert_eq!(tool_msg["role"], "tool");
    assert_eq!(tool_msg["parts"][0]["function_response"]["response"], "kinetic");

    let _ = std::fs::remove_dir_all(base);
}

#[tokio::test]
async fn test_react_escape_attempt_becomes_tool_error() {
    let base = scratch_dir();
    let model = MockModel::scripted(vec![
        Content::new(
            Role::Model,
            vec![Part::FunctionCall {
                id: "c1".to_string(),
                name: "read_file".to_string(),
                args: json!({"filename": "../../etc/passwd"}),
            }],
        ),
        Content::model("I cannot read that."),
    ]);
    let registry = default_registry(&base, &SearchConfig::default()).await;
    let store = Arc::new(InMemoryCheckpointer::new());
    let agent = ReActAgent::new(model, registry, ExecutorConfig::default(), store.clone())
        .await
        .unwrap();

    assert_eq!(agent.chat("t", "read passwd").await.unwrap(), "I cannot read that.");

    let latest = store.history("t").await.pop().unwrap();
    let response = latest.state["messages"][2]["parts"][0]["function_response"]["response"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(response.starts_with("Error: Path '../../etc/passwd' escapes"));
}

#[test]
fn test_path_containment() {
    let base = Path::new("/srv/kinetic/files");
    assert!(matches!(
        resolve_within(base, "../../etc/passwd"),
        Err(ToolError::PathEscapes(_))
    ));
    let ok = resolve_within(base, "sub/ok.txt").unwrap();
    assert!(ok.starts_with(base));
    assert!(ok.ends_with("sub/ok.txt"));
}

#[tokio::test]
async fn test_cli_loop_over_react_agent() {
    let model = MockModel::new(|history| {
        Content::model(format!("you said: {}", history.last().map(Content::text).unwrap_or_default()))
    });
    let agent = ReActAgent::new(
        model,
        default_registry(&scratch_dir(), &SearchConfig::default()).await,
        ExecutorConfig::default(),
        Arc::new(InMemoryCheckpointer::new()),
    )
    .await
    .unwrap();

    let input: &[u8] = b"hello\nbye\n";
    let mut output = Vec::new();
    run_chat_loop(input, &mut output, |turn| {
        let agent = agent.clone();
        async move { agent.chat("cli", &turn).await }
    })
    .await
    .unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Assistant: you said: hello\n"));
    assert!(text.ends_with("Goodbye!\n"));
}

// ============================================================================
// HTTP server
// ============================================================================

fn app(plan_tasks: usize, kind: ComplaintType) -> axum::Router {
    let state = Arc::new(AppState {
        plan: PlanAgent::new(planner(plan_tasks), ExecutorConfig::default()).unwrap(),
        complaint: ComplaintAgent::new(complaint_model(kind, "HIGH"), ExecutorConfig::default())
            .unwrap(),
    });
    router(state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app(1, ComplaintType::Other)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_complaint_endpoint() {
    let response = app(1, ComplaintType::FeePricing)
        .oneshot(post_json(
            "/api/complaints",
            json!({"title": "Fees", "description": "Charged twice"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["complaint_type"], "FEE_PRICING");
    assert_eq!(body["branch"], "service");
    assert_eq!(body["level"], "HIGH");
    assert_eq!(body["needs_human_review"], true);
}

#[tokio::test]
async fn test_plan_endpoint_and_validation() {
    let response = app(2, ComplaintType::Other)
        .oneshot(post_json("/api/plan", json!({"goal": "learn rust"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["completed_tasks"].as_array().unwrap().len(), 2);
    assert_eq!(body["final_res"], "All done");

    let response = app(2, ComplaintType::Other)
        .oneshot(post_json("/api/plan", json!({"goal": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_plan_stream_endpoint_emits_sse() {
    let response = app(1, ComplaintType::Other)
        .oneshot(post_json("/api/plan/stream", json!({"goal": "learn rust"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let events: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();

    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["node"], "plan_llm_call");
    assert_eq!(events[3], json!({"status": "finished"}));
}
