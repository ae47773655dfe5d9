//! Evaluation datasets in JSON Lines form.
//!
//! One record per line:
//!
//! ```json
//! {"id": "math-1", "input": "What is 15 + 27?", "expected_agent": "math_agent", "expected_answer": "42"}
//! {"id": "greet-1", "input": "hi"}
//! ```
//!
//! A [`RecordedRun`] is a record plus the trace of a run that already
//! happened, which lets stored traces be rescored without calling any model.

use crate::error::{EvalError, Result};
use crate::scorers::ScoreLabels;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use supervisor::ConversationTrace;

/// One evaluation case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// User request sent to the supervisor
    pub input: String,
    #[serde(flatten)]
    pub labels: ScoreLabels,
}

impl EvalRecord {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: None,
            input: input.into(),
            labels: ScoreLabels::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn expecting_agent(mut self, agent: impl Into<String>) -> Self {
        self.labels.expected_agent = Some(agent.into());
        self
    }

    pub fn expecting_answer(mut self, answer: impl Into<String>) -> Self {
        self.labels.expected_answer = Some(answer.into());
        self
    }

    pub fn expecting_domain(mut self, domain: impl Into<String>) -> Self {
        self.labels.expected_domains.push(domain.into());
        self
    }
}

/// A record together with a stored trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRun {
    #[serde(flatten)]
    pub record: EvalRecord,
    pub trace: ConversationTrace,
}

/// Parse JSON Lines from a reader; blank lines are skipped.
///
/// `path` only labels errors.
pub fn parse_jsonl<T, R>(reader: R, path: &Path) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut items = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| EvalError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| EvalError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Load a JSON Lines file
pub fn load_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| EvalError::io(path, e))?;
    parse_jsonl(std::io::BufReader::new(file), path)
}

/// Load evaluation records
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<EvalRecord>> {
    load_jsonl(path)
}

/// Load recorded runs
pub fn load_recorded_runs(path: impl AsRef<Path>) -> Result<Vec<RecordedRun>> {
    load_jsonl(path)
}
