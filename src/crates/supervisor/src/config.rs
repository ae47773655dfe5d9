//! Configuration Resolution
//!
//! Raw overrides arrive either as a typed [`ConfigOverrides`] (deserialized
//! from a YAML/JSON file) or as an untyped JSON object produced by an
//! evaluation playground. [`ConfigResolver`] validates them against the agent
//! catalog and produces a [`Configuration`]. Nothing here performs I/O or reads
//! global state, so resolving the same overrides twice yields equal values.
//!
//! # Playground parameters
//!
//! Besides the nested field names, [`ConfigOverrides::from_map`] accepts flat
//! per-agent keys:
//!
//! ```text
//! math_agent_prompt        -> agent_prompts["math_agent"]
//! math_agent_description   -> agent_descriptions["math_agent"]
//! math_model               -> agent_models["math_agent"]
//! ```
//!
//! Values may be wrapped as `{"value": ...}`; `null` leaves a field unset.
//!
//! # Example
//!
//! ```rust
//! use supervisor::agent::AgentCatalog;
//! use supervisor::config::{ConfigOverrides, ConfigResolver};
//! use serde_json::json;
//!
//! let resolver = ConfigResolver::for_catalog(&AgentCatalog::default_catalog());
//!
//! let params = json!({
//!     "math_model": {"value": "gpt-4o"},
//!     "research_agent_prompt": null
//! });
//! let overrides = ConfigOverrides::from_map(params.as_object().unwrap()).unwrap();
//! let config = resolver.resolve(&overrides).unwrap();
//!
//! assert_eq!(config.model_for("math_agent"), Some("gpt-4o"));
//! assert_eq!(config.prompt_for("research_agent"), None);
//! assert!(!config.is_default());
//! ```

use crate::agent::{AgentCatalog, DEFAULT_MODEL_ID};
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const SYSTEM_PROMPT: &str = "system_prompt";
const SUPERVISOR_MODEL: &str = "supervisor_model";
const AGENT_PROMPTS: &str = "agent_prompts";
const AGENT_DESCRIPTIONS: &str = "agent_descriptions";
const AGENT_MODELS: &str = "agent_models";

/// Unvalidated configuration overrides; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub system_prompt: Option<String>,
    pub supervisor_model: Option<String>,
    pub agent_prompts: BTreeMap<String, Option<String>>,
    pub agent_descriptions: BTreeMap<String, Option<String>>,
    pub agent_models: BTreeMap<String, Option<String>>,
}

impl ConfigOverrides {
    /// Parse a loosely typed parameter object.
    ///
    /// # Errors
    ///
    /// `UnknownField` for keys that are neither a nested field nor a flat
    /// per-agent key, `InvalidValue` for values that are not strings.
    pub fn from_map(params: &Map<String, Value>) -> Result<Self, ConfigurationError> {
        let mut overrides = Self::default();

        for (key, raw) in params {
            let value = unwrap_parameter(raw);
            match key.as_str() {
                SYSTEM_PROMPT => overrides.system_prompt = string_value(key, value)?,
                SUPERVISOR_MODEL => overrides.supervisor_model = string_value(key, value)?,
                AGENT_PROMPTS => overrides.agent_prompts.extend(agent_map(key, value)?),
                AGENT_DESCRIPTIONS => overrides.agent_descriptions.extend(agent_map(key, value)?),
                AGENT_MODELS => overrides.agent_models.extend(agent_map(key, value)?),
                _ => {
                    let value = string_value(key, value)?;
                    if let Some(agent) = key.strip_suffix("_prompt") {
                        overrides.agent_prompts.insert(agent.to_string(), value);
                    } else if let Some(agent) = key.strip_suffix("_description") {
                        overrides.agent_descriptions.insert(agent.to_string(), value);
                    } else if let Some(short) = key.strip_suffix("_model") {
                        overrides.agent_models.insert(agent_name(short), value);
                    } else {
                        return Err(ConfigurationError::UnknownField(key.clone()));
                    }
                }
            }
        }

        Ok(overrides)
    }
}

// Playground parameters arrive as {"value": x}
fn unwrap_parameter(raw: &Value) -> &Value {
    match raw {
        Value::Object(object) if object.len() == 1 => object.get("value").unwrap_or(raw),
        _ => raw,
    }
}

fn string_value(field: &str, value: &Value) -> Result<Option<String>, ConfigurationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        other => Err(ConfigurationError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a string, got {}", json_kind(other)),
        }),
    }
}

fn agent_map(
    field: &str,
    value: &Value,
) -> Result<BTreeMap<String, Option<String>>, ConfigurationError> {
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(entries) => entries
            .iter()
            .map(|(agent, raw)| {
                let value = string_value(&format!("{}.{}", field, agent), unwrap_parameter(raw))?;
                Ok((agent.clone(), value))
            })
            .collect(),
        other => Err(ConfigurationError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected an object, got {}", json_kind(other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `math` and `math_agent` both name the math agent
fn agent_name(short: &str) -> String {
    if short.ends_with("_agent") {
        short.to_string()
    } else {
        format!("{}_agent", short)
    }
}

/// Validated configuration.
///
/// Per-agent maps only hold agents that were explicitly overridden; an absent
/// entry means the template default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Configuration {
    system_prompt: Option<String>,
    supervisor_model: Option<String>,
    agent_prompts: BTreeMap<String, String>,
    agent_descriptions: BTreeMap<String, String>,
    agent_models: BTreeMap<String, String>,
}

impl Configuration {
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn supervisor_model(&self) -> Option<&str> {
        self.supervisor_model.as_deref()
    }

    pub fn agent_prompts(&self) -> &BTreeMap<String, String> {
        &self.agent_prompts
    }

    pub fn agent_descriptions(&self) -> &BTreeMap<String, String> {
        &self.agent_descriptions
    }

    pub fn agent_models(&self) -> &BTreeMap<String, String> {
        &self.agent_models
    }

    /// Prompt override for an agent
    pub fn prompt_for(&self, agent: &str) -> Option<&str> {
        self.agent_prompts.get(agent).map(String::as_str)
    }

    /// Description override for an agent
    pub fn description_for(&self, agent: &str) -> Option<&str> {
        self.agent_descriptions.get(agent).map(String::as_str)
    }

    /// Model override for an agent
    pub fn model_for(&self, agent: &str) -> Option<&str> {
        self.agent_models.get(agent).map(String::as_str)
    }

    /// Agents named by any per-agent override
    pub fn referenced_agents(&self) -> BTreeSet<&str> {
        self.agent_prompts
            .keys()
            .chain(self.agent_descriptions.keys())
            .chain(self.agent_models.keys())
            .map(String::as_str)
            .collect()
    }

    /// True when nothing deviates from what `catalog` builds by default.
    ///
    /// An agent model override is a no-op only when it names the model the
    /// agent's template already runs on; overrides for agents outside the
    /// catalog always count as custom. Only default configurations are
    /// served from the [`SupervisorCache`](crate::cache::SupervisorCache).
    pub fn is_default_for(&self, catalog: &AgentCatalog) -> bool {
        self.system_prompt.is_none()
            && self.agent_prompts.is_empty()
            && self.agent_descriptions.is_empty()
            && self
                .supervisor_model
                .as_deref()
                .map_or(true, |model| model == DEFAULT_MODEL_ID)
            && self.agent_models.iter().all(|(agent, model)| {
                catalog
                    .get(agent)
                    .map_or(false, |template| &template.model_id == model)
            })
    }

    /// [`is_default_for`](Self::is_default_for) the built-in catalog
    pub fn is_default(&self) -> bool {
        self.is_default_for(&AgentCatalog::default_catalog())
    }
}

/// Validates overrides against a fixed set of agent names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigResolver {
    agents: BTreeSet<String>,
}

impl ConfigResolver {
    /// Resolver for an explicit set of agent names
    pub fn new<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agents: agents.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolver for the agents of a catalog
    pub fn for_catalog(catalog: &AgentCatalog) -> Self {
        Self::new(catalog.names())
    }

    /// Known agent names
    pub fn agents(&self) -> &BTreeSet<String> {
        &self.agents
    }

    /// Validate overrides into a [`Configuration`]
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<Configuration, ConfigurationError> {
        let supervisor_model = overrides
            .supervisor_model
            .as_deref()
            .map(|model| model_id(SUPERVISOR_MODEL, model))
            .transpose()?;

        let agent_models: BTreeMap<String, String> = self
            .agent_entries(AGENT_MODELS, &overrides.agent_models)?
            .into_iter()
            .map(|(agent, model)| {
                let field = format!("{}.{}", AGENT_MODELS, agent);
                Ok((agent, model_id(&field, &model)?))
            })
            .collect::<Result<_, ConfigurationError>>()?;

        Ok(Configuration {
            system_prompt: overrides.system_prompt.clone(),
            supervisor_model,
            agent_prompts: self.agent_entries(AGENT_PROMPTS, &overrides.agent_prompts)?,
            agent_descriptions: self
                .agent_entries(AGENT_DESCRIPTIONS, &overrides.agent_descriptions)?,
            agent_models,
        })
    }

    /// Parse and validate a loosely typed parameter object
    pub fn resolve_map(&self, params: &Map<String, Value>) -> Result<Configuration, ConfigurationError> {
        self.resolve(&ConfigOverrides::from_map(params)?)
    }

    // Rejects unknown agents and drops unset entries
    fn agent_entries(
        &self,
        field: &str,
        entries: &BTreeMap<String, Option<String>>,
    ) -> Result<BTreeMap<String, String>, ConfigurationError> {
        let mut resolved = BTreeMap::new();
        for (agent, value) in entries {
            if !self.agents.contains(agent) {
                return Err(ConfigurationError::UnknownAgent {
                    field: field.to_string(),
                    agent: agent.clone(),
                });
            }
            if let Some(value) = value {
                resolved.insert(agent.clone(), value.clone());
            }
        }
        Ok(resolved)
    }
}

fn model_id(field: &str, model: &str) -> Result<String, ConfigurationError> {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::EmptyModelId {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
