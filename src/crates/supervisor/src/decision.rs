//! Supervisor Decision Function
//!
//! At every routing point the graph asks a [`SupervisorDecider`] what to do
//! next. The answer is a tagged [`Decision`]: answer the user directly, or
//! hand a task to the agent whose description matches `target` exactly. The
//! graph validates the target; deciders do not need to.
//!
//! [`ModelDecider`] is the default implementation. It exposes a single
//! `handoff` tool to the supervisor model whose `agent` argument enumerates
//! the agent descriptions, and reads the decision back from the tool call.

use crate::error::TransientError;
use crate::llm::{ChatModel, ChatRequest, ToolDefinition};
use crate::messages::{ConversationTrace, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Name of the tool the supervisor model calls to delegate
pub const HANDOFF_TOOL: &str = "handoff";

/// Outcome of one routing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Answer the user; ends the run
    Respond { content: String },
    /// Delegate `task` to the agent whose description equals `target`
    HandOff { target: String, task: String },
}

impl Decision {
    pub fn respond(content: impl Into<String>) -> Self {
        Decision::Respond {
            content: content.into(),
        }
    }

    pub fn hand_off(target: impl Into<String>, task: impl Into<String>) -> Self {
        Decision::HandOff {
            target: target.into(),
            task: task.into(),
        }
    }
}

/// Everything a decider may look at
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    /// Resolved supervisor instructions
    pub system_prompt: &'a str,
    /// Resolved supervisor model id
    pub model_id: &'a str,
    /// Agent descriptions in routing-table order
    pub descriptions: &'a [String],
    /// Trace so far
    pub trace: &'a ConversationTrace,
}

/// Routing policy of the supervisor
#[async_trait]
pub trait SupervisorDecider: Send + Sync {
    /// Decide the next step for the given trace
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, TransientError>;
}

/// Decider backed by a chat model
#[derive(Clone)]
pub struct ModelDecider {
    model: Arc<dyn ChatModel>,
}

impl ModelDecider {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// `handoff` tool definition for the given descriptions
    pub fn handoff_tool(descriptions: &[String]) -> ToolDefinition {
        ToolDefinition::new(
            HANDOFF_TOOL,
            "Delegate a task to one of the specialized agents. \
             Pick the agent by its description and describe the task it should perform.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "enum": descriptions,
                    "description": "Description of the agent to delegate to"
                },
                "task": {
                    "type": "string",
                    "description": "Self-contained task for the agent"
                }
            },
            "required": ["agent", "task"]
        }))
    }

    fn system_prompt(request: &DecisionRequest<'_>) -> String {
        let agents = request
            .descriptions
            .iter()
            .map(|description| format!("- {}", description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}\n\nAvailable agents (call the `{}` tool to delegate):\n{}",
            request.system_prompt, HANDOFF_TOOL, agents
        )
    }

    fn parse(reply: Message, trace: &ConversationTrace) -> Decision {
        let Some(call) = reply.tool_calls.iter().find(|call| call.name == HANDOFF_TOOL) else {
            return Decision::respond(reply.content);
        };

        let target = string_arg(&call.args, "agent").unwrap_or_default();
        // A missing task falls back to the latest user turn
        let task = string_arg(&call.args, "task").unwrap_or_else(|| {
            trace
                .iter()
                .rev()
                .find(|m| m.is_user())
                .map(|m| m.content.clone())
                .unwrap_or_default()
        });
        Decision::hand_off(target, task)
    }
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

impl std::fmt::Debug for ModelDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDecider").finish_non_exhaustive()
    }
}

#[async_trait]
impl SupervisorDecider for ModelDecider {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, TransientError> {
        let chat = ChatRequest::new(request.model_id, Self::system_prompt(&request))
            .with_tools(vec![Self::handoff_tool(request.descriptions)])
            .with_messages(request.trace.messages().to_vec());

        let reply = self.model.generate(chat).await?;
        let decision = Self::parse(reply, request.trace);
        debug!(?decision, "Supervisor decision");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ToolCall;
    use parking_lot::Mutex;

    struct Scripted {
        reply: Message,
        seen: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn generate(&self, request: ChatRequest) -> Result<Message, TransientError> {
            *self.seen.lock() = Some(request);
            Ok(self.reply.clone())
        }
    }

    fn descriptions() -> Vec<String> {
        vec!["Math helper".to_string(), "Research helper".to_string()]
    }

    async fn decide_with(reply: Message) -> (Decision, ChatRequest) {
        let model = Arc::new(Scripted {
            reply,
            seen: Mutex::new(None),
        });
        let decider = ModelDecider::new(model.clone());
        let trace = ConversationTrace::from_messages(vec![Message::user("What is 2 + 2?")]);
        let descriptions = descriptions();
        let decision = decider
            .decide(DecisionRequest {
                system_prompt: "You route.",
                model_id: "gpt-4o-mini",
                descriptions: &descriptions,
                trace: &trace,
            })
            .await
            .unwrap();
        let seen = model.seen.lock().take().unwrap();
        (decision, seen)
    }

    #[tokio::test]
    async fn test_plain_reply_is_a_response() {
        let (decision, request) = decide_with(Message::supervisor("Hello!")).await;
        assert_eq!(decision, Decision::respond("Hello!"));
        assert_eq!(request.model_id, "gpt-4o-mini");
        assert!(request.system_prompt.starts_with("You route."));
        assert!(request.system_prompt.contains("- Research helper"));
        assert_eq!(request.tools[0].name, HANDOFF_TOOL);
        assert_eq!(request.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_handoff_call_is_parsed() {
        let reply = Message::supervisor("").with_tool_calls(vec![ToolCall::new(
            "c1",
            HANDOFF_TOOL,
            json!({"agent": "Math helper", "task": "Add 2 and 2"}),
        )]);
        let (decision, _) = decide_with(reply).await;
        assert_eq!(decision, Decision::hand_off("Math helper", "Add 2 and 2"));
    }

    #[tokio::test]
    async fn test_missing_task_uses_user_turn() {
        let reply = Message::supervisor("").with_tool_calls(vec![ToolCall::new(
            "c1",
            HANDOFF_TOOL,
            json!({"agent": "Math helper"}),
        )]);
        let (decision, _) = decide_with(reply).await;
        assert_eq!(decision, Decision::hand_off("Math helper", "What is 2 + 2?"));
    }

    #[test]
    fn test_handoff_tool_enumerates_descriptions() {
        let tool = ModelDecider::handoff_tool(&descriptions());
        let params = tool.parameters.unwrap();
        assert_eq!(
            params["properties"]["agent"]["enum"],
            json!(["Math helper", "Research helper"])
        );
    }

    #[test]
    fn test_decision_serde_tag() {
        let value = serde_json::to_value(Decision::hand_off("a", "b")).unwrap();
        assert_eq!(value, json!({"type": "hand_off", "target": "a", "task": "b"}));
    }
}
