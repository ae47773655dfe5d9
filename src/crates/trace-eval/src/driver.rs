//! Batch Evaluation Driver
//!
//! Runs every dataset record through a [`RoutingGraph`], scores the resulting
//! trace and hands one [`EvalOutcome`] per record to a [`ScoreSink`].
//!
//! ```text
//! records ─> buffer_unordered(concurrency) ─> [timeout(run) + retry] ─> [TraceScorer + retry] ─> ScoreSink
//! ```
//!
//! Failures stay local to their record:
//!
//! - a run that fails (routing error, hand-off limit, exhausted retries)
//!   yields a zero [`ScoreReport`], the error text and the partial trace
//! - a run cancelled by the timeout yields a zero report and an empty trace;
//!   the partial trace is discarded, never scored
//! - a finished run whose judge keeps failing after retries yields a zero
//!   report, the error text and the full trace
//!
//! Only sink failures abort the batch.

use crate::dataset::{EvalRecord, RecordedRun};
use crate::error::Result;
use crate::retry::{retry_with_backoff, ErrorClass, RetryConfig, Retryable};
use crate::scorers::{agents_used, ExtraScores, ScoreReport, TraceScorer};
use crate::settings::EvalSettings;
use crate::sink::ScoreSink;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use supervisor::{ConversationTrace, RoutingGraph, RunFailure, TransientError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Result of evaluating one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalOutcome {
    /// Unique id of this outcome
    pub id: Uuid,
    /// Dataset id of the record, when it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub input: String,
    pub scores: ScoreReport,
    #[serde(default)]
    pub extras: ExtraScores,
    #[serde(default)]
    pub agents_used: Vec<String>,
    /// Full trace; partial for failed runs, empty for cancelled ones
    pub trace: ConversationTrace,
    /// Why the run did not finish or could not be scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Runs attempted, `0` for rescored recordings
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl EvalOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate over a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub failed: usize,
    /// Mean of each score over all records; failed runs count as zero
    pub mean: ScoreReport,
}

impl BatchSummary {
    fn add(&mut self, outcome: &EvalOutcome) {
        let n = self.total as f64;
        let mean = |current: f64, value: f64| (current * n + value) / (n + 1.0);

        self.mean = ScoreReport {
            routing_accuracy: mean(self.mean.routing_accuracy, outcome.scores.routing_accuracy),
            response_quality: mean(self.mean.response_quality, outcome.scores.response_quality),
            step_efficiency: mean(self.mean.step_efficiency, outcome.scores.step_efficiency),
            source_attribution: mean(
                self.mean.source_attribution,
                outcome.scores.source_attribution,
            ),
        };
        self.total += 1;
        if !outcome.is_success() {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Run(RunFailure),

    #[error("Run timed out after {0:?}")]
    TimedOut(Duration),
}

impl Retryable for AttemptError {
    fn classify(&self) -> ErrorClass {
        match self {
            AttemptError::Run(failure) => failure.classify(),
            AttemptError::TimedOut(_) => ErrorClass::Transient,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttemptError::Run(failure) => Retryable::retry_after(failure),
            AttemptError::TimedOut(_) => None,
        }
    }
}

/// Evaluates datasets against one routing graph
pub struct BatchEvaluator {
    graph: Arc<RoutingGraph>,
    scorer: TraceScorer,
    concurrency: usize,
    timeout: Option<Duration>,
    retry: RetryConfig,
}

impl BatchEvaluator {
    pub fn new(graph: Arc<RoutingGraph>, scorer: TraceScorer) -> Self {
        Self {
            graph,
            scorer,
            concurrency: 4,
            timeout: None,
            retry: RetryConfig::default(),
        }
    }

    /// Evaluator configured from settings
    pub fn from_settings(graph: Arc<RoutingGraph>, scorer: TraceScorer, settings: &EvalSettings) -> Self {
        Self::new(graph, scorer)
            .with_concurrency(settings.concurrency)
            .with_timeout(settings.timeout())
            .with_retry(settings.retry.clone())
    }

    /// Maximum runs in flight; at least one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Evaluate every record, emitting outcomes as runs complete.
    ///
    /// Outcomes reach the sink in completion order, not dataset order.
    pub async fn evaluate(&self, records: &[EvalRecord], sink: &dyn ScoreSink) -> Result<BatchSummary> {
        info!(
            records = records.len(),
            concurrency = self.concurrency,
            "Starting batch evaluation"
        );

        let mut outcomes = stream::iter(records)
            .map(|record| self.evaluate_record(record))
            .buffer_unordered(self.concurrency);

        let mut summary = BatchSummary::default();
        while let Some(outcome) = outcomes.next().await {
            sink.emit(&outcome).await?;
            summary.add(&outcome);
        }
        sink.finish().await?;

        info!(
            total = summary.total,
            failed = summary.failed,
            mean = summary.mean.mean(),
            "Batch evaluation finished"
        );
        Ok(summary)
    }

    /// Run and score a single record
    #[instrument(skip_all, fields(record = record.id.as_deref().unwrap_or("-")))]
    pub async fn evaluate_record(&self, record: &EvalRecord) -> EvalOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();

        let (result, attempts) =
            retry_with_backoff(&self.retry, "supervisor_run", || self.attempt(&record.input)).await;

        let (trace, scores, extras, error) = match result {
            Ok(trace) => {
                let extras = self.scorer.extras(&trace);
                match score_with_retry(&self.scorer, &trace, record, &self.retry).await {
                    Ok(scores) => {
                        debug!(?scores, "Run scored");
                        (trace, scores, extras, None)
                    }
                    Err(error) => (trace, ScoreReport::zero(), extras, Some(error)),
                }
            }
            Err(AttemptError::Run(failure)) => {
                warn!(error = %failure.error, "Run failed");
                (
                    failure.trace,
                    ScoreReport::zero(),
                    ExtraScores::default(),
                    Some(failure.error.to_string()),
                )
            }
            Err(timed_out @ AttemptError::TimedOut(_)) => {
                warn!(error = %timed_out, "Run cancelled");
                (
                    ConversationTrace::new(),
                    ScoreReport::zero(),
                    ExtraScores::default(),
                    Some(timed_out.to_string()),
                )
            }
        };

        EvalOutcome {
            id: Uuid::new_v4(),
            record_id: record.id.clone(),
            input: record.input.clone(),
            scores,
            extras,
            agents_used: agents_used(&trace),
            trace,
            error,
            attempts,
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
        }
    }

    async fn attempt(&self, input: &str) -> std::result::Result<ConversationTrace, AttemptError> {
        let run = self.graph.run(input);
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result.map_err(AttemptError::Run),
                Err(_) => Err(AttemptError::TimedOut(limit)),
            },
            None => run.await.map_err(AttemptError::Run),
        }
    }
}

impl std::fmt::Debug for BatchEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEvaluator")
            .field("graph", &self.graph)
            .field("scorer", &self.scorer)
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

async fn score_with_retry(
    scorer: &TraceScorer,
    trace: &ConversationTrace,
    record: &EvalRecord,
    retry: &RetryConfig,
) -> std::result::Result<ScoreReport, String> {
    let labels = &record.labels;
    let (result, attempts) =
        retry_with_backoff(retry, "judge", move || scorer.score(trace, labels)).await;
    result.map_err(|error: TransientError| {
        warn!(%error, attempts, "Scoring failed");
        format!("Scoring failed after {} attempts: {}", attempts, error)
    })
}

/// Score a stored trace without running anything.
///
/// Judge failures are retried under `retry`; when retries run out the
/// outcome carries the error and zero scores.
pub async fn score_recorded(scorer: &TraceScorer, run: &RecordedRun, retry: &RetryConfig) -> EvalOutcome {
    let started_at = Utc::now();
    let clock = Instant::now();
    let (scores, error) = match score_with_retry(scorer, &run.trace, &run.record, retry).await {
        Ok(scores) => (scores, None),
        Err(error) => (ScoreReport::zero(), Some(error)),
    };

    EvalOutcome {
        id: Uuid::new_v4(),
        record_id: run.record.id.clone(),
        input: run.record.input.clone(),
        scores,
        extras: scorer.extras(&run.trace),
        agents_used: agents_used(&run.trace),
        trace: run.trace.clone(),
        error,
        attempts: 0,
        started_at,
        duration_ms: clock.elapsed().as_millis() as u64,
    }
}

/// Rescore a set of recordings, emitting outcomes in input order
pub async fn score_recordings(
    scorer: &TraceScorer,
    runs: &[RecordedRun],
    retry: &RetryConfig,
    sink: &dyn ScoreSink,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for run in runs {
        let outcome = score_recorded(scorer, run, retry).await;
        sink.emit(&outcome).await?;
        summary.add(&outcome);
    }
    sink.finish().await?;

    info!(
        total = summary.total,
        failed = summary.failed,
        mean = summary.mean.mean(),
        "Recordings scored"
    );
    Ok(summary)
}
