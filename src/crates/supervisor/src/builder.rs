//! Supervisor Builder - Configuration to RoutingGraph
//!
//! The builder owns everything a graph needs besides the configuration: the
//! agent catalog, the model capability, the decision function, the tool
//! registry and the run limits. [`SupervisorBuilder::build`] applies a
//! resolved [`Configuration`] to the catalog and either returns a complete
//! [`RoutingGraph`] or a [`BuildError`]; nothing partially built escapes.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use supervisor::llm::ChatModel;
//! # fn model() -> Arc<dyn ChatModel> { unimplemented!() }
//! # fn web_search() -> Arc<dyn supervisor::tools::Tool> { unimplemented!() }
//! use supervisor::builder::SupervisorBuilder;
//! use supervisor::config::Configuration;
//! use supervisor::graph::GraphLimits;
//!
//! let builder = SupervisorBuilder::new(model())
//!     .with_tool(web_search())
//!     .with_limits(GraphLimits::default().with_max_handoffs(3));
//!
//! let graph = builder.build(&Configuration::default())?;
//! assert_eq!(graph.descriptions().len(), 2);
//! # Ok::<(), supervisor::error::BuildError>(())
//! ```

use crate::agent::{AgentCatalog, DEFAULT_MODEL_ID, DEFAULT_SYSTEM_PROMPT};
use crate::config::{ConfigResolver, Configuration};
use crate::decision::{ModelDecider, SupervisorDecider};
use crate::error::{BuildError, ConfigurationError};
use crate::graph::{AgentHandle, GraphLimits, RoutingGraph};
use crate::llm::ChatModel;
use crate::tools::{Tool, ToolRegistry};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// Anything that can turn a [`Configuration`] into a [`RoutingGraph`]
pub trait GraphBuilder: Send + Sync {
    fn build(&self, config: &Configuration) -> Result<RoutingGraph, BuildError>;

    /// Whether `config` builds the same graph as [`Configuration::default`]
    fn is_default_config(&self, config: &Configuration) -> bool {
        config.is_default()
    }
}

/// Builds routing graphs from an agent catalog
#[derive(Clone)]
pub struct SupervisorBuilder {
    catalog: AgentCatalog,
    model: Arc<dyn ChatModel>,
    decider: Option<Arc<dyn SupervisorDecider>>,
    tools: ToolRegistry,
    limits: GraphLimits,
}

impl SupervisorBuilder {
    /// Builder over the default catalog with the arithmetic tools registered.
    ///
    /// The research agent needs a `web_search` tool; register one with
    /// [`with_tool`](Self::with_tool) before building.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            catalog: AgentCatalog::default_catalog(),
            model,
            decider: None,
            tools: ToolRegistry::with_arithmetic(),
            limits: GraphLimits::default(),
        }
    }

    /// Replace the agent catalog
    pub fn with_catalog(mut self, catalog: AgentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use a custom decision function instead of [`ModelDecider`]
    pub fn with_decider(mut self, decider: Arc<dyn SupervisorDecider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// Replace the tool registry
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Register an additional tool
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn with_limits(mut self, limits: GraphLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    /// Resolver validating overrides against this builder's catalog
    pub fn resolver(&self) -> ConfigResolver {
        ConfigResolver::for_catalog(&self.catalog)
    }

    /// Build a graph for `config`
    pub fn build(&self, config: &Configuration) -> Result<RoutingGraph, BuildError> {
        if self.catalog.is_empty() {
            return Err(BuildError::EmptyCatalog);
        }
        if self.limits.max_agent_steps == 0 {
            return Err(BuildError::InvalidLimits(
                "max_agent_steps must be at least 1".to_string(),
            ));
        }
        self.check_agents(config)?;

        let mut agents = Vec::with_capacity(self.catalog.len());
        for template in self.catalog.iter() {
            let spec = template.apply(
                config.prompt_for(&template.name),
                config.description_for(&template.name),
                config.model_for(&template.name),
            );
            let tools = self.resolve_tools(&template.name, spec.tools().iter())?;
            agents.push(AgentHandle { spec, tools });
        }
        check_descriptions(&agents)?;

        let system_prompt = config
            .system_prompt()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_string();
        let supervisor_model = config
            .supervisor_model()
            .unwrap_or(DEFAULT_MODEL_ID)
            .to_string();
        let decider = self
            .decider
            .clone()
            .unwrap_or_else(|| Arc::new(ModelDecider::new(self.model.clone())));

        info!(
            agents = agents.len(),
            supervisor_model = %supervisor_model,
            default = config.is_default_for(&self.catalog),
            "Built routing graph"
        );

        Ok(RoutingGraph::new(
            system_prompt,
            supervisor_model,
            agents,
            self.model.clone(),
            decider,
            self.limits,
        ))
    }

    // A Configuration may come from a resolver over a different catalog
    fn check_agents(&self, config: &Configuration) -> Result<(), ConfigurationError> {
        let maps: [(&str, &BTreeMap<String, String>); 3] = [
            ("agent_prompts", config.agent_prompts()),
            ("agent_descriptions", config.agent_descriptions()),
            ("agent_models", config.agent_models()),
        ];
        for (field, map) in maps {
            if let Some(agent) = map.keys().find(|agent| !self.catalog.contains(agent)) {
                return Err(ConfigurationError::UnknownAgent {
                    field: field.to_string(),
                    agent: agent.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve tools from tool names using the registry
    fn resolve_tools<'a>(
        &self,
        agent: &str,
        names: impl Iterator<Item = &'a String>,
    ) -> Result<ToolRegistry, BuildError> {
        let mut tools = ToolRegistry::new();
        for name in names {
            let tool = self.tools.get(name).ok_or_else(|| BuildError::MissingTool {
                agent: agent.to_string(),
                tool: name.clone(),
            })?;
            tools.register(tool);
        }
        Ok(tools)
    }
}

/// Routing is by exact description, so two agents may never share one
fn check_descriptions(agents: &[AgentHandle]) -> Result<(), BuildError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for agent in agents {
        let (name, description) = (agent.spec.name(), agent.spec.description());
        if let Some(first) = seen.insert(description, name) {
            return Err(BuildError::DuplicateDescription {
                first: first.to_string(),
                second: name.to_string(),
                description: description.to_string(),
            });
        }
    }
    Ok(())
}

impl GraphBuilder for SupervisorBuilder {
    fn build(&self, config: &Configuration) -> Result<RoutingGraph, BuildError> {
        SupervisorBuilder::build(self, config)
    }

    fn is_default_config(&self, config: &Configuration) -> bool {
        config.is_default_for(&self.catalog)
    }
}

impl std::fmt::Debug for SupervisorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorBuilder")
            .field("catalog", &self.catalog.names().collect::<Vec<_>>())
            .field("tools", &self.tools)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentTemplate, MATH_AGENT, RESEARCH_AGENT};
    use crate::config::ConfigOverrides;
    use crate::error::{ToolError, TransientError};
    use crate::llm::ChatRequest;
    use crate::messages::Message;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NoModel;

    #[async_trait]
    impl ChatModel for NoModel {
        async fn generate(&self, _request: ChatRequest) -> Result<Message, TransientError> {
            Err(TransientError::ModelUnavailable("offline".into()))
        }
    }

    struct Search;

    #[async_trait]
    impl Tool for Search {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "search"
        }

        async fn invoke(&self, _input: Value) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new(Arc::new(NoModel)).with_tool(Arc::new(Search))
    }

    #[test]
    fn test_default_build() {
        let graph = builder().build(&Configuration::default()).unwrap();
        assert_eq!(graph.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(graph.supervisor_model(), DEFAULT_MODEL_ID);
        assert_eq!(graph.agent_specs().count(), 2);
        assert_eq!(graph.agent(MATH_AGENT).unwrap().tools().len(), 4);
    }

    #[test]
    fn test_overrides_applied() {
        let builder = builder();
        let mut overrides = ConfigOverrides {
            system_prompt: Some("Route carefully.".into()),
            ..Default::default()
        };
        overrides.agent_models.insert(RESEARCH_AGENT.into(), Some("gpt-4o".into()));
        let config = builder.resolver().resolve(&overrides).unwrap();

        let graph = builder.build(&config).unwrap();
        assert_eq!(graph.system_prompt(), "Route carefully.");
        assert_eq!(graph.agent(RESEARCH_AGENT).unwrap().model_id(), "gpt-4o");
        assert_eq!(graph.agent(MATH_AGENT).unwrap().model_id(), DEFAULT_MODEL_ID);
    }

    #[test]
    fn test_empty_catalog() {
        let err = builder()
            .with_catalog(AgentCatalog::new())
            .build(&Configuration::default())
            .unwrap_err();
        assert_eq!(err, BuildError::EmptyCatalog);
    }

    #[test]
    fn test_missing_tool() {
        let err = SupervisorBuilder::new(Arc::new(NoModel))
            .build(&Configuration::default())
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingTool {
                agent: RESEARCH_AGENT.into(),
                tool: "web_search".into()
            }
        );
    }

    #[test]
    fn test_zero_agent_steps_rejected() {
        let err = builder()
            .with_limits(GraphLimits::default().with_max_agent_steps(0))
            .build(&Configuration::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidLimits(_)));
    }

    #[test]
    fn test_config_from_other_catalog() {
        let other = ConfigResolver::new(["poet_agent"]);
        let mut overrides = ConfigOverrides::default();
        overrides.agent_prompts.insert("poet_agent".into(), Some("Rhyme.".into()));
        let config = other.resolve(&overrides).unwrap();

        let err = builder().build(&config).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Configuration(ConfigurationError::UnknownAgent { .. })
        ));
    }

    #[test]
    fn test_custom_catalog_without_tools() {
        let catalog = AgentCatalog::new().with_template(AgentTemplate::new("chat_agent", "Chats", "Chat."));
        let graph = SupervisorBuilder::new(Arc::new(NoModel))
            .with_catalog(catalog)
            .build(&Configuration::default())
            .unwrap();
        assert_eq!(graph.descriptions(), ["Chats".to_string()]);
    }
}
