//! # trace-eval - Scoring Supervisor Conversation Traces
//!
//! Derives routing, quality, efficiency and attribution metrics from the
//! [`ConversationTrace`](supervisor::ConversationTrace) of a supervisor run,
//! and drives whole datasets through a [`RoutingGraph`](supervisor::RoutingGraph).
//!
//! - **[Scorers](scorers)** - pure functions plus the [`TraceScorer`] bundle
//! - **[Judges](judge)** - answer-quality capability, deterministic and model-backed
//! - **[Datasets](dataset)** - JSON Lines records and recorded runs
//! - **[Driver](driver)** - bounded-concurrency batch runs with timeout and retry
//! - **[Sinks](sink)** - where outcomes go
//! - **[Settings](settings)** - YAML settings with `${ENV:default}` expansion
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trace_eval::{BatchEvaluator, JsonlSink, ReferenceJudge, TraceScorer};
//!
//! let records = trace_eval::dataset::load_records("data/supervisor.jsonl")?;
//! let scorer = TraceScorer::new(Arc::new(ReferenceJudge));
//! let sink = JsonlSink::create("outcomes.jsonl").await?;
//!
//! let summary = BatchEvaluator::new(graph, scorer)
//!     .with_concurrency(8)
//!     .evaluate(&records, &sink)
//!     .await?;
//! println!("{} runs, {} failed", summary.total, summary.failed);
//! ```

pub mod dataset;
pub mod driver;
pub mod error;
pub mod judge;
pub mod retry;
pub mod scorers;
pub mod settings;
pub mod sink;

pub use dataset::{EvalRecord, RecordedRun};
pub use driver::{score_recorded, score_recordings, BatchEvaluator, BatchSummary, EvalOutcome};
pub use error::{EvalError, Result};
pub use judge::{Judge, ModelJudge, ReferenceJudge};
pub use retry::RetryConfig;
pub use scorers::{ExtraScores, ScoreLabels, ScoreReport, TraceScorer};
pub use settings::EvalSettings;
pub use sink::{JsonlSink, MemorySink, ScoreSink};
