//! Trace Scorers
//!
//! Pure functions over a finished [`ConversationTrace`] plus dataset labels.
//! Apart from [`response_quality`], which delegates to a [`Judge`], every
//! scorer is deterministic and the same trace always yields the same score.
//!
//! | Scorer | Signal | Range |
//! |--------|--------|-------|
//! | [`routing_accuracy`] | first agent consulted vs. expected agent | `{0, 0.5, 1}` |
//! | [`response_quality`] | final answer vs. expected answer | `[0, 1]` |
//! | [`step_efficiency`] | `1 / (1 + hand-offs)` | `(0, 1]` |
//! | [`source_attribution`] | expected domains cited by tool results | `[0, 1]` |
//! | [`message_budget_efficiency`] | trace length vs. budget | `[0, 1]` |
//! | [`tool_usage`] | any valid tool called | `{0, 1}` |
//! | [`tool_call_efficiency`] | tool calls made by agents | `{0.4, 0.6, 0.8, 1}` |
//! | [`search_efficiency`] | searches made by agents | `{0.5, 0.7, 0.9, 1}` |
//! | [`response_format`] | final answer contains a number | `{0, 1}` |

use crate::judge::Judge;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use supervisor::agent::WEB_SEARCH_TOOL;
use supervisor::{ConversationTrace, Role, ToolCall, TransientError};

/// Message budget used by [`message_budget_efficiency`] by default
pub const DEFAULT_MAX_MESSAGES: usize = 8;

/// Tools that count for [`tool_usage`] by default
pub const DEFAULT_VALID_TOOLS: [&str; 4] = ["add", "subtract", "multiply", "divide"];

/// Dataset labels a trace is scored against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreLabels {
    /// Agent that should be consulted first; `None` when a direct answer is expected
    pub expected_agent: Option<String>,
    /// Reference answer for the judge
    pub expected_answer: Option<String>,
    /// Domains that should appear among the cited sources
    pub expected_domains: Vec<String>,
}

/// The four headline scores of one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub routing_accuracy: f64,
    pub response_quality: f64,
    pub step_efficiency: f64,
    pub source_attribution: f64,
}

impl ScoreReport {
    /// Report recorded for runs that did not finish
    pub fn zero() -> Self {
        Self::default()
    }

    /// Unweighted mean of the four scores
    pub fn mean(&self) -> f64 {
        (self.routing_accuracy + self.response_quality + self.step_efficiency + self.source_attribution)
            / 4.0
    }
}

/// Secondary deterministic scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtraScores {
    pub message_budget_efficiency: f64,
    pub tool_usage: f64,
    pub tool_call_efficiency: f64,
    pub search_efficiency: f64,
    pub response_format: f64,
}

/// Was the expected agent consulted, and first?
///
/// `1.0` if the first attributed agent is the expected one, `0.5` if it was
/// consulted later, `0.0` otherwise. With no expected agent, a trace that
/// never delegated scores `1.0`.
pub fn routing_accuracy(trace: &ConversationTrace, expected_agent: Option<&str>) -> f64 {
    match expected_agent {
        None if trace.agents_used().is_empty() => 1.0,
        None => 0.0,
        Some(expected) if trace.first_agent() == Some(expected) => 1.0,
        // Partial credit for a late but correct delegation
        Some(expected) if trace.agents_used().contains(&expected) => 0.5,
        Some(_) => 0.0,
    }
}

/// Judge the final supervisor answer; `0.0` if the run never answered.
///
/// Judge failures are returned, never scored.
pub async fn response_quality(
    trace: &ConversationTrace,
    expected_answer: Option<&str>,
    judge: &dyn Judge,
) -> Result<f64, TransientError> {
    match trace.final_response() {
        Some(answer) => Ok(clamp_unit(judge.judge(&answer.content, expected_answer).await?)),
        None => Ok(0.0),
    }
}

/// Fewer hand-offs is better
pub fn step_efficiency(trace: &ConversationTrace) -> f64 {
    1.0 / (1.0 + trace.handoff_count() as f64)
}

/// Fraction of distinct expected domains that appear in any tool result.
///
/// Matching is a case-insensitive substring search. No expected domains
/// scores `1.0`.
pub fn source_attribution(trace: &ConversationTrace, expected_domains: &[String]) -> f64 {
    let domains: BTreeSet<String> = expected_domains
        .iter()
        .map(|domain| domain.trim().to_lowercase())
        .filter(|domain| !domain.is_empty())
        .collect();
    if domains.is_empty() {
        return 1.0;
    }

    let results: Vec<String> = trace
        .tool_results()
        .map(|message| message.content.to_lowercase())
        .collect();
    let found = domains
        .iter()
        .filter(|domain| results.iter().any(|content| content.contains(domain.as_str())))
        .count();

    found as f64 / domains.len() as f64
}

/// `1.0` up to `max_messages` messages, then a linear penalty reaching `0.0`
/// at twice the budget
pub fn message_budget_efficiency(trace: &ConversationTrace, max_messages: usize) -> f64 {
    let count = trace.len();
    if count <= max_messages {
        return 1.0;
    }
    if max_messages == 0 {
        return 0.0;
    }
    let over = (count - max_messages) as f64;
    (1.0 - over / max_messages as f64).max(0.0)
}

/// `1.0` if any agent called one of `valid_tools`
pub fn tool_usage<S: AsRef<str>>(trace: &ConversationTrace, valid_tools: &[S]) -> f64 {
    let used =
        agent_tool_calls(trace).any(|call| valid_tools.iter().any(|tool| tool.as_ref() == call.name));
    if used {
        1.0
    } else {
        0.0
    }
}

fn agent_tool_calls(trace: &ConversationTrace) -> impl Iterator<Item = &ToolCall> {
    trace
        .iter()
        .filter(|message| message.role == Role::Agent)
        .flat_map(|message| message.tool_calls.iter())
}

/// Tiered by the number of tool calls agents made: up to 2 scores `1.0`,
/// up to 4 `0.8`, up to 6 `0.6`, more `0.4`
pub fn tool_call_efficiency(trace: &ConversationTrace) -> f64 {
    match agent_tool_calls(trace).count() {
        0..=2 => 1.0,
        3..=4 => 0.8,
        5..=6 => 0.6,
        _ => 0.4,
    }
}

/// Tiered by calls to `search_tool`: one search scores `1.0`, two `0.9`,
/// up to 4 `0.7`, more `0.5`. A trace with no search lands in the `0.7` tier.
pub fn search_efficiency(trace: &ConversationTrace, search_tool: &str) -> f64 {
    match agent_tool_calls(trace).filter(|call| call.name == search_tool).count() {
        1 => 1.0,
        2 => 0.9,
        0 | 3..=4 => 0.7,
        _ => 0.5,
    }
}

/// `1.0` if the final answer contains a number
pub fn response_format(trace: &ConversationTrace) -> f64 {
    match trace.final_response() {
        Some(answer) if answer.content.chars().any(|c| c.is_ascii_digit()) => 1.0,
        _ => 0.0,
    }
}

/// Distinct agents consulted, in order
pub fn agents_used(trace: &ConversationTrace) -> Vec<String> {
    trace.agents_used().into_iter().map(str::to_string).collect()
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Runs every scorer over a trace
#[derive(Clone)]
pub struct TraceScorer {
    judge: Arc<dyn Judge>,
    max_messages: usize,
    valid_tools: Vec<String>,
    search_tool: String,
}

impl TraceScorer {
    pub fn new(judge: Arc<dyn Judge>) -> Self {
        Self {
            judge,
            max_messages: DEFAULT_MAX_MESSAGES,
            valid_tools: DEFAULT_VALID_TOOLS.iter().map(|tool| tool.to_string()).collect(),
            search_tool: WEB_SEARCH_TOOL.to_string(),
        }
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_valid_tools(mut self, valid_tools: Vec<String>) -> Self {
        self.valid_tools = valid_tools;
        self
    }

    /// Tool counted by [`search_efficiency`]
    pub fn with_search_tool(mut self, search_tool: impl Into<String>) -> Self {
        self.search_tool = search_tool.into();
        self
    }

    /// Headline scores for a finished trace; fails only if the judge does
    pub async fn score(
        &self,
        trace: &ConversationTrace,
        labels: &ScoreLabels,
    ) -> Result<ScoreReport, TransientError> {
        let response_quality =
            response_quality(trace, labels.expected_answer.as_deref(), self.judge.as_ref()).await?;
        Ok(ScoreReport {
            routing_accuracy: routing_accuracy(trace, labels.expected_agent.as_deref()),
            response_quality,
            step_efficiency: step_efficiency(trace),
            source_attribution: source_attribution(trace, &labels.expected_domains),
        })
    }

    /// Secondary scores for a finished trace
    pub fn extras(&self, trace: &ConversationTrace) -> ExtraScores {
        ExtraScores {
            message_budget_efficiency: message_budget_efficiency(trace, self.max_messages),
            tool_usage: tool_usage(trace, &self.valid_tools),
            tool_call_efficiency: tool_call_efficiency(trace),
            search_efficiency: search_efficiency(trace, &self.search_tool),
            response_format: response_format(trace),
        }
    }
}

impl std::fmt::Debug for TraceScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceScorer")
            .field("max_messages", &self.max_messages)
            .field("valid_tools", &self.valid_tools)
            .field("search_tool", &self.search_tool)
            .finish_non_exhaustive()
    }
}
