//! Model capability consumed by the supervisor and its agents.
//!
//! This crate does not talk to any LLM provider. Callers implement
//! [`ChatModel`] for the provider of their choice and hand an
//! `Arc<dyn ChatModel>` to the [`SupervisorBuilder`](crate::builder::SupervisorBuilder).
//! A single model object serves every agent; the request carries the model id
//! each agent was configured with.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use supervisor::error::TransientError;
//! use supervisor::llm::{ChatModel, ChatRequest};
//! use supervisor::messages::Message;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ChatModel for Echo {
//!     async fn generate(&self, request: ChatRequest) -> Result<Message, TransientError> {
//!         let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
//!         Ok(Message::agent(last))
//!     }
//! }
//! ```
//!
//! # Errors
//!
//! Implementations report infrastructure problems (provider down, rate limits,
//! timeouts) as [`TransientError`]. The graph propagates them unchanged and
//! never retries on its own.

use crate::error::TransientError;
use crate::messages::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Definition of a tool/function that a model can call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The unique name/identifier for this tool
    pub name: String,

    /// What the tool does; the model uses this to decide when to call it
    pub description: String,

    /// JSON Schema describing the tool's parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonValue>,
}

impl ToolDefinition {
    /// Create a new tool definition with name and description
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Add a JSON Schema for the tool's parameters
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// One `generate(system_prompt, tool_specs, history)` call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier, e.g. `gpt-4o-mini`
    pub model_id: String,

    /// Instructions for the model
    pub system_prompt: String,

    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,

    /// Conversation history, oldest first
    pub messages: Vec<Message>,
}

impl ChatRequest {
    /// Create a request without tools or history
    pub fn new(model_id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            tools: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Set the tools available for this call
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the conversation history
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}

/// Chat-based language model.
///
/// The returned message's `tool_calls` drive the agent tool loop: a reply
/// with tool calls is followed by tool execution and another `generate`
/// call, a reply without them ends the agent's turn.
///
/// Implementations must be `Send + Sync`; share them as `Arc<dyn ChatModel>`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the next message for the given request
    async fn generate(&self, request: ChatRequest) -> Result<Message, TransientError>;
}
