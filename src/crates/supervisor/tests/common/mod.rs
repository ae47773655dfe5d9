//! Deterministic stand-ins for the model and the search tool.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use supervisor::decision::HANDOFF_TOOL;
use supervisor::{
    ChatModel, ChatRequest, Decision, DecisionRequest, Message, Role, SupervisorBuilder,
    SupervisorDecider, Tool, ToolCall, ToolError, TransientError,
};

/// Rule-based model that behaves like a well-prompted supervisor and agents.
///
/// * Supervisor calls (the `handoff` tool is offered): questions with `+`
///   go to the math agent, anything else is answered directly; once an agent
///   has replied the supervisor relays its answer.
/// * Agent calls: the first turn calls `add` on the two numbers in the task,
///   the next turn reports the tool result.
#[derive(Default)]
pub struct RuleModel {
    pub calls: AtomicUsize,
}

impl RuleModel {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn numbers(text: &str) -> Vec<f64> {
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .filter_map(|part| part.trim_matches('.').parse().ok())
        .collect()
}

#[async_trait]
impl ChatModel for RuleModel {
    async fn generate(&self, request: ChatRequest) -> Result<Message, TransientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = request.messages.last().cloned().unwrap_or_else(|| Message::user(""));

        if request.tools.iter().any(|tool| tool.name == HANDOFF_TOOL) {
            if last.role == Role::Agent {
                return Ok(Message::supervisor(format!("The answer is {}", last.content)));
            }
            if last.content.contains('+') {
                let math = request.tools[0].parameters.as_ref().and_then(|p| {
                    p["properties"]["agent"]["enum"]
                        .as_array()?
                        .iter()
                        .filter_map(Value::as_str)
                        .find(|d| d.starts_with("Math"))
                        .map(str::to_string)
                });
                let call = ToolCall::new(
                    "sup_1",
                    HANDOFF_TOOL,
                    json!({"agent": math.unwrap_or_default(), "task": last.content}),
                );
                return Ok(Message::supervisor("").with_tool_calls(vec![call]));
            }
            return Ok(Message::supervisor("Hello! How can I help?"));
        }

        match last.role {
            Role::Tool => Ok(Message::agent(last.content)),
            _ => {
                let n = numbers(&last.content);
                let call = ToolCall::new(
                    "call_1",
                    "add",
                    json!({"a": n.first().copied().unwrap_or(0.0), "b": n.get(1).copied().unwrap_or(0.0)}),
                );
                Ok(Message::agent("").with_tool_calls(vec![call]))
            }
        }
    }
}

/// Replays agent replies in order, then answers `"done"`
pub struct ReplayModel(Mutex<VecDeque<Result<Message, TransientError>>>);

impl ReplayModel {
    pub fn new(replies: Vec<Result<Message, TransientError>>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(replies.into())))
    }
}

#[async_trait]
impl ChatModel for ReplayModel {
    async fn generate(&self, _request: ChatRequest) -> Result<Message, TransientError> {
        self.0
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Message::agent("done")))
    }
}

/// Decider that replays decisions, then responds
pub struct ScriptedDecider(Mutex<VecDeque<Decision>>);

impl ScriptedDecider {
    pub fn new(decisions: Vec<Decision>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(decisions.into())))
    }
}

#[async_trait]
impl SupervisorDecider for ScriptedDecider {
    async fn decide(&self, _request: DecisionRequest<'_>) -> Result<Decision, TransientError> {
        Ok(self
            .0
            .lock()
            .pop_front()
            .unwrap_or_else(|| Decision::respond("done")))
    }
}

/// Decider that delegates forever to the first agent
pub struct AlwaysHandOff;

#[async_trait]
impl SupervisorDecider for AlwaysHandOff {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, TransientError> {
        Ok(Decision::hand_off(request.descriptions[0].clone(), "again"))
    }
}

/// Search tool returning a fixed result with a source URL
pub struct FakeSearch;

#[async_trait]
impl Tool for FakeSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web"
    }

    async fn invoke(&self, input: Value) -> Result<Value, ToolError> {
        Ok(json!({
            "query": input["query"],
            "results": [{"url": "https://en.wikipedia.org/wiki/Mount_Everest", "content": "8849 m"}]
        }))
    }
}

pub fn builder(model: Arc<dyn ChatModel>) -> SupervisorBuilder {
    SupervisorBuilder::new(model).with_tool(Arc::new(FakeSearch))
}
