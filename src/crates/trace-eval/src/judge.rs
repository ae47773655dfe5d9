//! Response quality judges.
//!
//! A [`Judge`] rates a candidate answer against an optional reference on a
//! `[0, 1]` scale. The scorer clamps whatever comes back, so implementations
//! do not have to.
//!
//! A judge that cannot reach its model returns the [`TransientError`]; the
//! caller decides whether to retry.

use async_trait::async_trait;
use std::sync::Arc;
use supervisor::{ChatModel, ChatRequest, Message, TransientError};
use tracing::warn;

/// Rates an answer
#[async_trait]
pub trait Judge: Send + Sync {
    /// Score `candidate`; `reference` is the expected answer when one exists
    async fn judge(&self, candidate: &str, reference: Option<&str>) -> Result<f64, TransientError>;
}

/// Deterministic judge: the reference must appear in the candidate.
///
/// Matching is case-insensitive and ignores surrounding whitespace. Without a
/// reference any non-empty answer passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceJudge;

#[async_trait]
impl Judge for ReferenceJudge {
    async fn judge(&self, candidate: &str, reference: Option<&str>) -> Result<f64, TransientError> {
        let candidate = candidate.trim().to_lowercase();
        let passed = match reference.map(|r| r.trim().to_lowercase()) {
            Some(reference) => candidate.contains(&reference),
            None => !candidate.is_empty(),
        };
        Ok(if passed { 1.0 } else { 0.0 })
    }
}

/// Grade labels the model judge answers with, and what each is worth
pub const CHOICE_SCORES: [(&str, f64); 4] = [
    ("EXCELLENT", 1.0),
    ("GOOD", 0.75),
    ("FAIR", 0.5),
    ("POOR", 0.0),
];

const JUDGE_PROMPT: &str = "\
You grade answers produced by an AI assistant.
Think through whether the answer is accurate and complete, then finish with \
one grade on its own line:
EXCELLENT: accurate, complete and well explained
GOOD: accurate but missing minor details
FAIR: partially correct or incomplete
POOR: wrong, irrelevant or missing";

/// Score for a grade label, ignoring case and surrounding punctuation
pub fn choice_score(label: &str) -> Option<f64> {
    let label = label.trim_matches(|c: char| !c.is_ascii_alphabetic());
    CHOICE_SCORES
        .iter()
        .find(|(choice, _)| choice.eq_ignore_ascii_case(label))
        .map(|(_, score)| *score)
}

/// LLM-as-judge backed by any [`ChatModel`].
///
/// The reply's last grade label wins, so reasoning may precede it. A reply
/// that starts with a bare number is taken as that score. Anything else
/// scores `0.0` and is logged; model failures are returned to the caller.
pub struct ModelJudge {
    model: Arc<dyn ChatModel>,
    model_id: String,
}

impl ModelJudge {
    pub fn new(model: Arc<dyn ChatModel>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }

    fn parse(reply: &str) -> Option<f64> {
        if let Some(score) = reply.split_whitespace().rev().find_map(choice_score) {
            return Some(score);
        }
        reply
            .split_whitespace()
            .next()?
            .trim_matches(|c: char| !c.is_ascii_digit() && c != '.')
            .parse()
            .ok()
    }
}

#[async_trait]
impl Judge for ModelJudge {
    async fn judge(&self, candidate: &str, reference: Option<&str>) -> Result<f64, TransientError> {
        let question = match reference {
            Some(reference) => format!("Expected answer: {}\n\nAnswer to grade: {}", reference, candidate),
            None => format!("Answer to grade: {}", candidate),
        };
        let request = ChatRequest::new(self.model_id.as_str(), JUDGE_PROMPT)
            .with_messages(vec![Message::user(question)]);

        let reply = self.model.generate(request).await?;
        Ok(Self::parse(&reply.content).unwrap_or_else(|| {
            warn!(reply = %reply.content, "Judge reply is not a score");
            0.0
        }))
    }
}

impl std::fmt::Debug for ModelJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelJudge")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}
