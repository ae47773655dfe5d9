//! Tools - Capabilities Agents Can Invoke
//!
//! Agents name their tools in their [`AgentSpec`](crate::agent::AgentSpec);
//! the [`SupervisorBuilder`](crate::builder::SupervisorBuilder) resolves those
//! names against a [`ToolRegistry`] when the graph is built. A missing tool is
//! a build error, a failing tool is not: at run time tool failures become
//! error messages in the trace.
//!
//! The crate ships the arithmetic tools used by the math agent. Anything that
//! reaches the outside world (web search for the research agent) is supplied
//! by the caller.
//!
//! # Example
//!
//! ```rust
//! use supervisor::tools::{Tool, ToolInput, ToolOutput, ToolRegistry};
//! use supervisor::error::ToolError;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct WebSearch;
//!
//! #[async_trait]
//! impl Tool for WebSearch {
//!     fn name(&self) -> &str {
//!         "web_search"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Search the web and return the top results with URLs"
//!     }
//!
//!     async fn invoke(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
//!         Ok(serde_json::json!({"results": [], "query": input["query"]}))
//!     }
//! }
//!
//! let registry = ToolRegistry::with_arithmetic().with_tool(Arc::new(WebSearch));
//! assert!(registry.contains("web_search"));
//! assert!(registry.contains("add"));
//! ```

use crate::error::ToolError;
use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub mod arithmetic;

pub use arithmetic::{ArithmeticOp, ArithmeticTool};

/// Tool input type
pub type ToolInput = Value;

/// Tool output type
pub type ToolOutput = Value;

/// Tool trait for implementing agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get the tool description
    fn description(&self) -> &str;

    /// Get the input schema (optional)
    fn input_schema(&self) -> Option<Value> {
        None
    }

    /// Execute the tool with the given input
    async fn invoke(&self, input: ToolInput) -> Result<ToolOutput, ToolError>;

    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition {
        let definition = ToolDefinition::new(self.name(), self.description());
        match self.input_schema() {
            Some(schema) => definition.with_parameters(schema),
            None => definition,
        }
    }
}

/// Named set of tools shared by the agents of a graph
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `add`, `subtract`, `multiply` and `divide`
    pub fn with_arithmetic() -> Self {
        ArithmeticOp::ALL
            .iter()
            .fold(Self::new(), |registry, op| {
                registry.with_tool(Arc::new(ArithmeticTool::new(*op)))
            })
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions of every tool, in name order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Execute a tool by name
    pub async fn invoke(&self, name: &str, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.invoke(input).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_tools())
            .finish()
    }
}

/// Render a tool output as message content.
///
/// Strings are used verbatim, everything else is compact JSON.
pub fn render_output(output: &ToolOutput) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
