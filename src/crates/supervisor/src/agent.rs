//! Agent Definitions - Templates, Specs and the Built-in Catalog
//!
//! An [`AgentTemplate`] is an agent before configuration overrides are
//! applied. The [`SupervisorBuilder`](crate::builder::SupervisorBuilder)
//! turns each template of its [`AgentCatalog`] into a concrete, immutable
//! [`AgentSpec`] by layering the resolved
//! [`Configuration`](crate::config::Configuration) on top.
//!
//! The default catalog holds two agents:
//!
//! | Name | Tools | Purpose |
//! |------|-------|---------|
//! | `research_agent` | `web_search` (caller supplied) | factual lookups with cited sources |
//! | `math_agent` | `add`, `subtract`, `multiply`, `divide` | arithmetic |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Model id used by the supervisor and every built-in agent
pub const DEFAULT_MODEL_ID: &str = "gpt-4o-mini";

/// Name of the built-in research agent
pub const RESEARCH_AGENT: &str = "research_agent";

/// Name of the built-in math agent
pub const MATH_AGENT: &str = "math_agent";

/// Tool the research agent expects the caller to register
pub const WEB_SEARCH_TOOL: &str = "web_search";

/// Default supervisor instructions
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant that can delegate tasks to specialized agents when needed.

You have access to the following specialized agents:
- Research Agent: For web searches and finding information online
- Math Agent: For mathematical calculations and arithmetic

IMPORTANT INSTRUCTIONS:
- For simple greetings, small talk, or general conversational responses, respond directly yourself
- ALWAYS delegate to the Research Agent for:
  * Factual questions about real-world events, people, places, or statistics
  * Questions asking \"who\", \"what\", \"when\", \"where\" about specific facts
  * Historical records, achievements, or data points
  * ANY question where accurate, verified information is important
  * Questions that could benefit from current or verified information
- ONLY delegate to the Math Agent for queries requiring calculations with specific numbers
- When delegating, assign work to one agent at a time, do not call agents in parallel
- When in doubt about whether to research something, USE THE RESEARCH AGENT - it's better to verify facts than to rely on potentially outdated information

In order to complete the objective that the user asks of you, you have access to specialized agents.";

pub const DEFAULT_RESEARCH_AGENT_DESCRIPTION: &str = "\
Research agent with web search capabilities. \
Use this agent for: web searches, finding information online, \
looking up current events, researching topics, gathering data from the internet, \
answering questions that require external knowledge or real-time information.";

pub const DEFAULT_MATH_AGENT_DESCRIPTION: &str = "\
Math calculation agent with arithmetic tools. \
Use this agent for: mathematical calculations, arithmetic operations, \
addition, subtraction, multiplication, division, numerical computations, \
solving math problems, performing calculations.";

pub const DEFAULT_RESEARCH_AGENT_PROMPT: &str = "\
You are a research agent.

INSTRUCTIONS:
- Assist ONLY with research-related tasks, DO NOT do any math
- Provide links to sources of your information in the response
- After you're done with your tasks, respond to the supervisor directly
- Respond ONLY with the results of your work, do NOT include ANY other text.";

pub const DEFAULT_MATH_AGENT_PROMPT: &str = "\
You are a math agent.

INSTRUCTIONS:
- Assist ONLY with math-related tasks
- After you're done with your tasks, respond to the supervisor directly
- Respond ONLY with the results of your work, do NOT include ANY other text.";

/// Resolved agent, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    name: String,
    description: String,
    prompt: String,
    model_id: String,
    tools: BTreeSet<String>,
}

impl AgentSpec {
    /// Unique agent name, e.g. `math_agent`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routing description the supervisor selects by
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Agent system prompt
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Model id the agent runs on
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Tool names, sorted
    pub fn tools(&self) -> &BTreeSet<String> {
        &self.tools
    }
}

/// Agent before configuration overrides are applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub name: String,
    pub description: String,
    pub prompt: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub tools: BTreeSet<String>,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl AgentTemplate {
    /// Create a template on the default model with no tools
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt: prompt.into(),
            model_id: default_model_id(),
            tools: BTreeSet::new(),
        }
    }

    /// Set the default model
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Add a tool by name
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.insert(tool.into());
        self
    }

    /// Built-in research agent
    pub fn research() -> Self {
        Self::new(
            RESEARCH_AGENT,
            DEFAULT_RESEARCH_AGENT_DESCRIPTION,
            DEFAULT_RESEARCH_AGENT_PROMPT,
        )
        .with_tool(WEB_SEARCH_TOOL)
    }

    /// Built-in math agent
    pub fn math() -> Self {
        ["add", "subtract", "multiply", "divide"].into_iter().fold(
            Self::new(MATH_AGENT, DEFAULT_MATH_AGENT_DESCRIPTION, DEFAULT_MATH_AGENT_PROMPT),
            |template, tool| template.with_tool(tool),
        )
    }

    /// Layer overrides on top of the template
    pub(crate) fn apply(
        &self,
        prompt: Option<&str>,
        description: Option<&str>,
        model_id: Option<&str>,
    ) -> AgentSpec {
        AgentSpec {
            name: self.name.clone(),
            description: description.unwrap_or(&self.description).to_string(),
            prompt: prompt.unwrap_or(&self.prompt).to_string(),
            model_id: model_id.unwrap_or(&self.model_id).to_string(),
            tools: self.tools.clone(),
        }
    }
}

/// Set of agent templates keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentCatalog {
    templates: BTreeMap<String, AgentTemplate>,
}

impl AgentCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Research and math agents
    pub fn default_catalog() -> Self {
        Self::new()
            .with_template(AgentTemplate::research())
            .with_template(AgentTemplate::math())
    }

    /// Add a template, replacing any template with the same name
    pub fn with_template(mut self, template: AgentTemplate) -> Self {
        self.templates.insert(template.name.clone(), template);
        self
    }

    /// Agent names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&AgentTemplate> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in name order
    pub fn iter(&self) -> impl Iterator<Item = &AgentTemplate> {
        self.templates.values()
    }
}
