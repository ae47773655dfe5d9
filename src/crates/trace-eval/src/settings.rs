//! Evaluation settings loaded from YAML.
//!
//! String values may reference environment variables as `${VAR}` or
//! `${VAR:default}`; references are expanded before deserialization.
//!
//! ```yaml
//! concurrency: 8
//! timeout_secs: ${EVAL_TIMEOUT:90}
//! dataset: ${EVAL_DATASET:data/supervisor.jsonl}
//! retry:
//!   max_retries: 2
//! overrides:
//!   agent_models:
//!     math_agent: gpt-4o
//! ```
//!
//! A value that is exactly one reference is re-read as a YAML scalar after
//! expansion, so `${EVAL_TIMEOUT:90}` becomes the number `90` and
//! `${EVAL_JITTER:false}` the boolean `false`, at any depth. References
//! embedded in longer text always expand to strings.

use crate::error::{EvalError, Result};
use crate::judge::Judge;
use crate::retry::RetryConfig;
use crate::scorers::{TraceScorer, DEFAULT_MAX_MESSAGES, DEFAULT_VALID_TOOLS};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use supervisor::{ConfigOverrides, GraphLimits, RoutingGraph, SupervisorBuilder};

/// Settings for a batch evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalSettings {
    /// Runs evaluated at the same time
    pub concurrency: usize,

    /// Per-run wall clock limit; `0` disables it
    pub timeout_secs: u64,

    /// Retry policy for transient run failures
    pub retry: RetryConfig,

    /// Message budget for the budget-efficiency score
    pub max_messages: usize,

    /// Tools that count as tool usage
    pub valid_tools: Vec<String>,

    /// Graph limits used when building the supervisor
    pub limits: GraphLimits,

    /// Supervisor configuration under evaluation
    pub overrides: ConfigOverrides,

    /// Dataset to evaluate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,

    /// Where outcomes are written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 120,
            retry: RetryConfig::default(),
            max_messages: DEFAULT_MAX_MESSAGES,
            valid_tools: DEFAULT_VALID_TOOLS.iter().map(|tool| tool.to_string()).collect(),
            limits: GraphLimits::default(),
            overrides: ConfigOverrides::default(),
            dataset: None,
            output: None,
        }
    }
}

impl EvalSettings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings: Self = load_yaml_config(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Per-run timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Scorer using this message budget and tool list
    pub fn scorer(&self, judge: Arc<dyn Judge>) -> TraceScorer {
        TraceScorer::new(judge)
            .with_max_messages(self.max_messages)
            .with_valid_tools(self.valid_tools.clone())
    }

    /// Graph under evaluation: `overrides` resolved against the builder's
    /// catalog, built with `limits`
    pub fn build_graph(&self, builder: &SupervisorBuilder) -> Result<RoutingGraph> {
        let config = builder.resolver().resolve(&self.overrides)?;
        Ok(builder.clone().with_limits(self.limits).build(&config)?)
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(EvalError::Settings("concurrency must be at least 1".to_string()));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(EvalError::Settings(
                "retry.backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(EvalError::Settings(
                "retry.jitter must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a YAML file with environment variables expanded
pub fn load_yaml_file(path: impl AsRef<Path>) -> Result<YamlValue> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;

    let mut value: YamlValue = serde_yaml::from_str(&content).map_err(|e| {
        EvalError::Settings(format!("Failed to parse YAML file {}: {}", path.display(), e))
    })?;
    expand_variables(&mut value);

    Ok(value)
}

/// Load and deserialize a YAML file into a specific type
pub fn load_yaml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let yaml = load_yaml_file(path)?;
    let json = yaml_to_json(&yaml)?;

    serde_json::from_value(json)
        .map_err(|e| EvalError::Settings(format!("Failed to deserialize settings: {}", e)))
}

fn expand_variables(value: &mut YamlValue) {
    match value {
        YamlValue::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                let scalar = is_single_reference(s).then(|| yaml_scalar(&expanded)).flatten();
                *value = scalar.unwrap_or(YamlValue::String(expanded));
            }
        }
        YamlValue::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                expand_variables(v);
            }
        }
        YamlValue::Sequence(seq) => {
            for item in seq.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// Expand `${ENV_VAR:default_value}` references
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let re = Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok()?;
    let expanded = re.replace_all(s, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        env::var(&cap[1]).unwrap_or_else(|_| default_value.to_string())
    });

    Some(expanded.into_owned())
}

fn is_single_reference(s: &str) -> bool {
    Regex::new(r"^\$\{[^:}]+(?::[^}]*)?\}$").map_or(false, |re| re.is_match(s.trim()))
}

/// `text` as a YAML number or boolean, if it is one
fn yaml_scalar(text: &str) -> Option<YamlValue> {
    match serde_yaml::from_str(text).ok()? {
        scalar @ (YamlValue::Number(_) | YamlValue::Bool(_)) => Some(scalar),
        _ => None,
    }
}

fn yaml_to_json(yaml: &YamlValue) -> Result<JsonValue> {
    match yaml {
        YamlValue::Null => Ok(JsonValue::Null),
        YamlValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(JsonValue::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(JsonValue::Number(u.into()))
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    .ok_or_else(|| EvalError::Settings(format!("Invalid number: {}", n)))
            }
        }
        YamlValue::String(s) => Ok(JsonValue::String(s.clone())),
        YamlValue::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        YamlValue::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let YamlValue::String(key) = k else {
                    return Err(EvalError::Settings("Map keys must be strings".to_string()));
                };
                json_map.insert(key.clone(), yaml_to_json(v)?);
            }
            Ok(JsonValue::Object(json_map))
        }
        YamlValue::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}
