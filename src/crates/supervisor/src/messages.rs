//! Message Types - The Conversation Trace
//!
//! Every run of a [`RoutingGraph`](crate::graph::RoutingGraph) produces a
//! [`ConversationTrace`]: the ordered list of messages exchanged between the
//! user, the supervisor, the agents and their tools. The order is the
//! execution order and the trace scorers depend on it.
//!
//! # Roles
//!
//! | Role | Produced by | Attribution |
//! |------|-------------|-------------|
//! | `user` | caller | none |
//! | `supervisor` | decision step | target agent on hand-off, none on the final answer |
//! | `agent` | agent model call | the agent |
//! | `tool` | tool invocation inside an agent | the agent |
//!
//! # Example
//!
//! ```rust
//! use supervisor::messages::{ConversationTrace, Message, ToolCall};
//! use serde_json::json;
//!
//! let trace = ConversationTrace::from_messages(vec![
//!     Message::user("What is 15 + 27?"),
//!     Message::supervisor("Add 15 and 27").with_attribution("math_agent"),
//!     Message::agent("")
//!         .with_attribution("math_agent")
//!         .with_tool_calls(vec![ToolCall::new("call_1", "add", json!({"a": 15, "b": 27}))]),
//!     Message::tool("42", "call_1").with_attribution("math_agent"),
//!     Message::agent("42").with_attribution("math_agent"),
//!     Message::supervisor("15 + 27 = 42"),
//! ]);
//!
//! assert_eq!(trace.handoff_count(), 1);
//! assert_eq!(trace.first_agent(), Some("math_agent"));
//! assert_eq!(trace.final_response().unwrap().content, "15 + 27 = 42");
//! ```
//!
//! # Serialization Format
//!
//! A trace serializes as a plain JSON array so recorded runs can be replayed
//! through the scorers:
//!
//! ```json
//! [
//!   {"role": "user", "content": "What is 15 + 27?"},
//!   {"role": "supervisor", "content": "Add 15 and 27", "agent_attribution": "math_agent",
//!    "tool_calls": [{"id": "handoff_1", "name": "handoff", "args": {"agent": "...", "task": "..."}}]},
//!   {"role": "tool", "content": "42", "agent_attribution": "math_agent", "tool_call_id": "call_1"}
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user
    User,
    /// Coordinating supervisor
    Supervisor,
    /// Specialized agent
    Agent,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Agent => write!(f, "agent"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Tool call structure representing a function/tool invocation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A message in a conversation trace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Message author
    pub role: Role,

    /// Message content
    #[serde(default)]
    pub content: String,

    /// Agent this message belongs to (hand-off target for supervisor messages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_attribution: Option<String>,

    /// Tool calls requested by this message, in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Tool call this message answers (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Set on tool messages carrying an error payload
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            agent_attribution: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a supervisor message
    pub fn supervisor(content: impl Into<String>) -> Self {
        Self::new(Role::Supervisor, content)
    }

    /// Create an agent message
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Attribute the message to an agent
    pub fn with_attribution(mut self, agent: impl Into<String>) -> Self {
        self.agent_attribution = Some(agent.into());
        self
    }

    /// Add tool calls
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Mark as an error payload
    pub fn as_error(mut self) -> Self {
        self.is_error = true;
        self
    }

    /// Check if this is a user message
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Check if this is a tool message
    pub fn is_tool(&self) -> bool {
        self.role == Role::Tool
    }

    /// Check if message has tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Supervisor message delegating to an agent
    pub fn is_handoff(&self) -> bool {
        self.role == Role::Supervisor && self.agent_attribution.is_some()
    }

    /// Supervisor message answering the user directly
    pub fn is_terminal(&self) -> bool {
        self.role == Role::Supervisor && self.agent_attribution.is_none()
    }
}

/// Ordered record of the messages produced during one run.
///
/// The graph appends to a trace while it runs and hands it to the caller when
/// the run ends; nothing mutates it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationTrace {
    messages: Vec<Message>,
}

impl ConversationTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap recorded messages, e.g. when replaying a stored run
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages in execution order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consume the trace
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Iterate messages in execution order
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Final supervisor answer, if the run completed
    pub fn final_response(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.is_terminal())
    }

    /// Supervisor hand-off messages in order
    pub fn handoffs(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_handoff())
    }

    /// Number of hand-offs the supervisor made
    pub fn handoff_count(&self) -> usize {
        self.handoffs().count()
    }

    /// First agent attribution observed in the trace
    pub fn first_agent(&self) -> Option<&str> {
        self.messages
            .iter()
            .find_map(|m| m.agent_attribution.as_deref())
    }

    /// Distinct agents in order of first appearance
    pub fn agents_used(&self) -> Vec<&str> {
        let mut agents: Vec<&str> = Vec::new();
        for agent in self.messages.iter().filter_map(|m| m.agent_attribution.as_deref()) {
            if !agents.contains(&agent) {
                agents.push(agent);
            }
        }
        agents
    }

    /// Tool result messages in order
    pub fn tool_results(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_tool())
    }
}

impl<'a> IntoIterator for &'a ConversationTrace {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
