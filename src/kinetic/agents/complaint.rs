// SPDX-License-Identifier: MIT

//! Complaint intake workflow
//!
//! `intent` classifies the complaint once, the router sends it to one of five
//! desks, and every desk converges on `reply` and `notify`.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::adk::error::{BoxError, GraphError, RunError};
use crate::adk::model::{generate_structured, Content, Model};
use crate::kinetic::workflow::graph::{
    CompiledGraph, ExecutorConfig, RouteTable, StateGraph, Step, END, START,
};
use crate::kinetic::workflow::state::{
    FieldType, StateFieldDef, StateSchema, StateUpdate, WorkflowState,
};

pub const INTENT_STEP: &str = "intent";
pub const REPLY_STEP: &str = "reply";
pub const NOTIFY_STEP: &str = "notify";

/// Complaint category assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintType {
    /// Debit and credit cards: applications, limits, disputes, annual fees
    CardBusiness,
    /// Personal and business loans: approval, disbursement, repayment, collection
    LoanBusiness,
    /// Transfers, bills, cross-border and third-party payments
    PaymentSettlement,
    /// Wealth products, funds and insurance
    FinancialManagement,
    /// Staff attitude and communication
    ServiceAttitude,
    /// Efficiency, system stability, branch environment, equipment
    ServiceQuality,
    /// Misleading sales, unauthorized sign-ups, undisclosed risks
    MarketingSales,
    /// Opaque or disputed fees and interest rates
    FeePricing,
    /// Internal policies, business rules and procedures
    PolicyProcess,
    /// Insufficient or inaccurate product and contract disclosure
    InformationDisclosure,
    /// Anything else
    Other,
}

impl ComplaintType {
    pub const ALL: [ComplaintType; 11] = [
        ComplaintType::CardBusiness,
        ComplaintType::LoanBusiness,
        ComplaintType::PaymentSettlement,
        ComplaintType::FinancialManagement,
        ComplaintType::ServiceAttitude,
        ComplaintType::ServiceQuality,
        ComplaintType::MarketingSales,
        ComplaintType::FeePricing,
        ComplaintType::PolicyProcess,
        ComplaintType::InformationDisclosure,
        ComplaintType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintType::CardBusiness => "CARD_BUSINESS",
            ComplaintType::LoanBusiness => "LOAN_BUSINESS",
            ComplaintType::PaymentSettlement => "PAYMENT_SETTLEMENT",
            ComplaintType::FinancialManagement => "FINANCIAL_MANAGEMENT",
            ComplaintType::ServiceAttitude => "SERVICE_ATTITUDE",
            ComplaintType::ServiceQuality => "SERVICE_QUALITY",
            ComplaintType::MarketingSales => "MARKETING_SALES",
            ComplaintType::FeePricing => "FEE_PRICING",
            ComplaintType::PolicyProcess => "POLICY_PROCESS",
            ComplaintType::InformationDisclosure => "INFORMATION_DISCLOSURE",
            ComplaintType::Other => "OTHER",
        }
    }

    pub fn branch(self) -> ComplaintBranch {
        match self {
            ComplaintType::CardBusiness
            | ComplaintType::LoanBusiness
            | ComplaintType::PaymentSettlement
            | ComplaintType::FinancialManagement => ComplaintBranch::Business,
            ComplaintType::ServiceAttitude
            | ComplaintType::ServiceQuality
            | ComplaintType::MarketingSales
            | ComplaintType::FeePricing => ComplaintBranch::Service,
            ComplaintType::PolicyProcess => ComplaintBranch::Process,
            ComplaintType::InformationDisclosure => ComplaintBranch::Security,
            ComplaintType::Other => ComplaintBranch::Other,
        }
    }
}

impl RouteTable for ComplaintType {
    fn variants() -> &'static [Self] {
        &Self::ALL
    }

    fn key(self) -> &'static str {
        self.as_str()
    }

    fn target(self) -> &'static str {
        self.branch().step_name()
    }
}

impl fmt::Display for ComplaintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much time the bank has to respond
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseWindow {
    Hours(u32),
    WorkingDays(u32),
}

impl fmt::Display for ResponseWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseWindow::Hours(h) => write!(f, "{h} hours"),
            ResponseWindow::WorkingDays(d) => write!(f, "{d} working days"),
        }
    }
}

/// Urgency assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintLevel {
    /// Major losses, mass incidents, systemic or media risk
    Emergency,
    /// Large losses, likely litigation or regulator complaints
    High,
    /// Ordinary service issues, small fee disputes
    Medium,
    /// Simple questions, minor service flaws
    Low,
}

impl ComplaintLevel {
    pub fn response_window(self) -> ResponseWindow {
        match self {
            ComplaintLevel::Emergency => ResponseWindow::Hours(2),
            ComplaintLevel::High => ResponseWindow::Hours(24),
            ComplaintLevel::Medium => ResponseWindow::WorkingDays(3),
            ComplaintLevel::Low => ResponseWindow::WorkingDays(5),
        }
    }

    pub fn requires_human_review(self) -> bool {
        matches!(self, ComplaintLevel::Emergency | ComplaintLevel::High)
    }
}

/// Desk that handles a complaint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintBranch {
    Business,
    Service,
    Process,
    Security,
    Other,
}

impl ComplaintBranch {
    pub const ALL: [ComplaintBranch; 5] = [
        ComplaintBranch::Business,
        ComplaintBranch::Service,
        ComplaintBranch::Process,
        ComplaintBranch::Security,
        ComplaintBranch::Other,
    ];

    pub fn step_name(self) -> &'static str {
        match self {
            ComplaintBranch::Business => "business",
            ComplaintBranch::Service => "service",
            ComplaintBranch::Process => "process",
            ComplaintBranch::Security => "security",
            ComplaintBranch::Other => "other",
        }
    }

    pub fn desk(self) -> &'static str {
        match self {
            ComplaintBranch::Business => "business operations desk",
            ComplaintBranch::Service => "customer service desk",
            ComplaintBranch::Process => "policy and process desk",
            ComplaintBranch::Security => "information security desk",
            ComplaintBranch::Other => "general complaints desk",
        }
    }
}

/// Structured output of the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntentOutput {
    #[serde(rename = "type")]
    pub complaint_type: ComplaintType,
    pub level: ComplaintLevel,
}

pub fn complaint_schema() -> StateSchema {
    StateSchema::new()
        .field("complaint_info", StateFieldDef::new(FieldType::Object))
        .field("intent_type", StateFieldDef::new(FieldType::String))
        .field("intent_level", StateFieldDef::new(FieldType::String))
        .field("handled_by", StateFieldDef::new(FieldType::String))
        .field("response_deadline", StateFieldDef::new(FieldType::String))
        .field("reply_result", StateFieldDef::new(FieldType::String))
        .field("needs_human_review", StateFieldDef::new(FieldType::Boolean))
}

fn parse_label<T: DeserializeOwned>(state: &WorkflowState, key: &str) -> Result<T, String> {
    let raw = state.get_str(key).unwrap_or_default();
    serde_json::from_value(Value::String(raw.to_string())).map_err(|_| raw.to_string())
}

/// Read the classification from state; the raw label on failure
pub fn classify(state: &WorkflowState) -> Result<ComplaintType, String> {
    parse_label(state, "intent_type")
}

fn level_of(state: &WorkflowState) -> Result<ComplaintLevel, BoxError> {
    parse_label(state, "intent_level")
        .map_err(|raw| format!("unknown complaint level '{raw}'").into())
}

const INTENT_PROMPT: &str = "\
You are a complaint classification assistant for a retail bank. \
Identify the complaint type and its urgency level.

Types:
CARD_BUSINESS: debit and credit cards, applications, limits, loss reports, transaction and annual fee disputes
LOAN_BUSINESS: personal and business loans, approval, disbursement, repayment, extension, collection
PAYMENT_SETTLEMENT: transfers, bills, cross-border and third-party payments
FINANCIAL_MANAGEMENT: wealth products, funds, insurance sales, operation and redemption
SERVICE_ATTITUDE: staff attitude, communication, courtesy
SERVICE_QUALITY: efficiency, system stability, branch environment, equipment
MARKETING_SALES: misleading sales, improper marketing, unauthorized sign-ups, undisclosed risks
FEE_PRICING: opaque fees, arbitrary charges, fee or interest rate disputes
POLICY_PROCESS: internal policies, business rules, procedures
INFORMATION_DISCLOSURE: insufficient or inaccurate product, risk or contract disclosure
OTHER: anything not covered above

Levels:
EMERGENCY: major losses, mass incidents, systemic risk or media exposure; respond within 2 hours
HIGH: large losses, likely litigation or regulator complaints; respond within 24 hours
MEDIUM: ordinary service issues, small fee disputes; respond within 3 working days
LOW: simple questions, minor service flaws; respond within 5 working days";

struct IntentStep {
    model: Arc<dyn Model>,
}

#[async_trait]
impl Step for IntentStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let title = state.get_path("complaint_info.title").cloned().unwrap_or_default();
        let description = state
            .get_path("complaint_info.description")
            .cloned()
            .unwrap_or_default();

        let intent: IntentOutput = generate_structured(
            self.model.as_ref(),
            INTENT_STEP,
            &[
                Content::system(INTENT_PROMPT),
                Content::user(format!(
                    "Complaint title: {}\nComplaint description: {}",
                    title.as_str().unwrap_or_default(),
                    description.as_str().unwrap_or_default()
                )),
            ],
        )
        .await?;

        log::info!(
            "Complaint classified as {} / {:?}",
            intent.complaint_type,
            intent.level
        );

        Ok(StateUpdate::new()
            .set("intent_type", serde_json::to_value(intent.complaint_type)?)
            .set("intent_level", serde_json::to_value(intent.level)?))
    }
}

struct BranchStep {
    branch: ComplaintBranch,
}

#[async_trait]
impl Step for BranchStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let level = level_of(state)?;
        let window = level.response_window();
        log::info!(
            "Complaint routed to the {}, respond within {}",
            self.branch.desk(),
            window
        );

        Ok(StateUpdate::new()
            .set("handled_by", self.branch.desk())
            .set("response_deadline", window.to_string()))
    }
}

struct ReplyStep {
    model: Arc<dyn Model>,
}

#[async_trait]
impl Step for ReplyStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let info = state.get("complaint_info").cloned().unwrap_or(Value::Null);
        let prompt = format!(
            "Complaint: {}\nCategory: {}\nHandled by: {}\nWe will respond within: {}",
            info,
            state.get_str("intent_type").unwrap_or_default(),
            state.get_str("handled_by").unwrap_or_default(),
            state.get_str("response_deadline").unwrap_or_default()
        );

        let reply = self
            .model
            .generate_content(
                &[
                    Content::system(
                        "You draft polite, concise replies to bank customers who filed a \
                         complaint. Acknowledge the issue, name the responsible desk and \
                         the response deadline. Do not promise compensation.",
                    ),
                    Content::user(prompt),
                ],
                None,
                None,
            )
            .await?;

        Ok(StateUpdate::new().set("reply_result", reply.text()))
    }
}

struct NotifyStep;

#[async_trait]
impl Step for NotifyStep {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, BoxError> {
        let level = level_of(state)?;
        let review = level.requires_human_review();
        if review {
            log::warn!(
                "{:?} complaint handled by the {} needs human review",
                level,
                state.get_str("handled_by").unwrap_or_default()
            );
        }
        Ok(StateUpdate::new().set("needs_human_review", review))
    }
}

pub fn build_complaint_graph(
    model: Arc<dyn Model>,
    config: ExecutorConfig,
) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new("complaint", complaint_schema())
        .add_step(INTENT_STEP, IntentStep { model: model.clone() })
        .add_step(REPLY_STEP, ReplyStep { model })
        .add_step(NOTIFY_STEP, NotifyStep)
        .add_edge(START, INTENT_STEP)
        .add_routed_edge::<ComplaintType, _>(INTENT_STEP, classify)
        .add_edge(REPLY_STEP, NOTIFY_STEP)
        .add_edge(NOTIFY_STEP, END);

    for branch in ComplaintBranch::ALL {
        graph = graph
            .add_step(branch.step_name(), BranchStep { branch })
            .add_edge(branch.step_name(), REPLY_STEP);
    }

    graph.compile_with(config, None)
}

/// Result of handling one complaint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplaintOutcome {
    pub complaint_type: ComplaintType,
    pub level: ComplaintLevel,
    pub branch: ComplaintBranch,
    pub handled_by: String,
    pub response_deadline: String,
    pub reply: String,
    pub needs_human_review: bool,
}

/// Complaint agent wrapping the compiled intake graph
#[derive(Clone)]
pub struct ComplaintAgent {
    graph: CompiledGraph,
}

impl ComplaintAgent {
    pub fn new(model: Arc<dyn Model>, config: ExecutorConfig) -> Result<Self, GraphError> {
        Ok(Self {
            graph: build_complaint_graph(model, config)?,
        })
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub async fn handle(&self, title: &str, description: &str) -> Result<ComplaintOutcome, RunError> {
        let state = self
            .graph
            .run(StateUpdate::new().set(
                "complaint_info",
                json!({ "title": title, "description": description }),
            ))
            .await?;

        // The router only reaches `reply` through a recognized type, and the
        // branch step has already validated the level.
        let complaint_type = classify(&state).map_err(|value| RunError::RouterViolation {
            step: INTENT_STEP.to_string(),
            value,
        })?;
        let level = level_of(&state).map_err(|source| RunError::StepFailed {
            step: NOTIFY_STEP.to_string(),
            state: state.to_json(),
            source,
        })?;

        Ok(ComplaintOutcome {
            complaint_type,
            level,
            branch: complaint_type.branch(),
            handled_by: state.get_str("handled_by").unwrap_or_default().to_string(),
            response_deadline: state
                .get_str("response_deadline")
                .unwrap_or_default()
                .to_string(),
            reply: state.get_str("reply_result").unwrap_or_default().to_string(),
            needs_human_review: state
                .get("needs_human_review")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}
