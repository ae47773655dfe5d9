//! Batch evaluation against a deterministic supervisor

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use supervisor::{
    AgentCatalog, AgentTemplate, ChatModel, ChatRequest, ConfigOverrides, Configuration,
    ConversationTrace, Decision, DecisionRequest, GraphLimits, Message, Role, RoutingGraph,
    SupervisorBuilder, SupervisorDecider, TransientError,
};
use trace_eval::dataset::load_jsonl;
use trace_eval::{
    score_recorded, BatchEvaluator, EvalOutcome, EvalRecord, EvalSettings, JsonlSink,
    MemorySink, ModelJudge, RecordedRun, ReferenceJudge, RetryConfig, ScoreReport, TraceScorer,
};

const MATH: &str = "Math helper";

/// Routes arithmetic to the math agent, relays its answer, greets otherwise.
/// Requests mentioning "misroute" name an agent that does not exist.
struct KeywordDecider;

#[async_trait]
impl SupervisorDecider for KeywordDecider {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision, TransientError> {
        let last = request.trace.last().cloned().unwrap_or_else(|| Message::user(""));
        if last.role == Role::Agent {
            return Ok(Decision::respond(format!("Answer: {}", last.content)));
        }
        if last.content.contains("misroute") {
            return Ok(Decision::hand_off("Poetry helper", last.content));
        }
        if last.content.contains('+') {
            return Ok(Decision::hand_off(MATH, last.content));
        }
        Ok(Decision::respond("Hello!"))
    }
}

/// Adds the numbers in the task. Tasks containing "flaky" fail while
/// `failures` lasts; tasks containing "slow" never finish.
#[derive(Default)]
struct AddingModel {
    failures: AtomicUsize,
}

impl AddingModel {
    fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl ChatModel for AddingModel {
    async fn generate(&self, request: ChatRequest) -> Result<Message, TransientError> {
        let task = request.messages[0].content.clone();
        if task.contains("slow") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if task.contains("flaky")
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(TransientError::ModelUnavailable("503".into()));
        }
        let sum: i64 = task
            .split(|c: char| !c.is_ascii_digit())
            .filter_map(|part| part.parse::<i64>().ok())
            .sum();
        Ok(Message::agent(sum.to_string()))
    }
}

/// Grading model that is rate limited for its first `failures` calls,
/// then grades everything EXCELLENT
struct GradingModel {
    calls: AtomicUsize,
    failures: usize,
}

impl GradingModel {
    fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures,
        })
    }
}

#[async_trait]
impl ChatModel for GradingModel {
    async fn generate(&self, _request: ChatRequest) -> Result<Message, TransientError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(TransientError::RateLimited { retry_after: None });
        }
        Ok(Message::agent("Correct sum.\nEXCELLENT"))
    }
}

fn builder(model: AddingModel) -> SupervisorBuilder {
    let catalog = AgentCatalog::new().with_template(AgentTemplate::new("math_agent", MATH, "Add."));
    SupervisorBuilder::new(Arc::new(model))
        .with_catalog(catalog)
        .with_decider(Arc::new(KeywordDecider))
}

fn graph(model: AddingModel) -> Arc<RoutingGraph> {
    Arc::new(builder(model).build(&Configuration::default()).unwrap())
}

fn evaluator(model: AddingModel) -> BatchEvaluator {
    BatchEvaluator::new(graph(model), TraceScorer::new(Arc::new(ReferenceJudge)))
        .with_retry(RetryConfig::new(3).with_backoff(Duration::from_millis(10)).without_jitter())
}

fn find<'a>(outcomes: &'a [EvalOutcome], id: &str) -> &'a EvalOutcome {
    outcomes
        .iter()
        .find(|o| o.record_id.as_deref() == Some(id))
        .unwrap()
}

#[tokio::test]
async fn test_failed_run_does_not_abort_siblings() {
    let records = vec![
        EvalRecord::new("What is 2 + 3?")
            .with_id("math")
            .expecting_agent("math_agent")
            .expecting_answer("5"),
        EvalRecord::new("hi").with_id("greet"),
        EvalRecord::new("misroute 1 + 1").with_id("bad"),
    ];
    let sink = MemorySink::new();

    let summary = evaluator(AddingModel::default())
        .evaluate(&records, &sink)
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);

    let outcomes = sink.outcomes();
    let math = find(&outcomes, "math");
    assert!(math.is_success());
    assert_eq!(math.scores.routing_accuracy, 1.0);
    assert_eq!(math.scores.response_quality, 1.0);
    assert_eq!(math.scores.step_efficiency, 0.5);
    assert_eq!(math.agents_used, vec!["math_agent"]);
    assert_eq!(math.attempts, 1);

    let greet = find(&outcomes, "greet");
    assert_eq!(greet.scores.routing_accuracy, 1.0);
    assert_eq!(greet.trace.len(), 2);

    let bad = find(&outcomes, "bad");
    assert_eq!(bad.scores, trace_eval::ScoreReport::zero());
    assert!(bad.error.as_deref().unwrap().contains("Poetry helper"));
    assert_eq!(bad.trace.len(), 1);
    assert_eq!(bad.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let record = EvalRecord::new("flaky 2 + 2").expecting_answer("4");

    let outcome = evaluator(AddingModel::failing(2)).evaluate_record(&record).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.scores.response_quality, 1.0);
    // Only the successful attempt's trace is kept
    assert_eq!(outcome.trace.handoff_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_record_the_error() {
    let record = EvalRecord::new("flaky 2 + 2");

    let outcome = evaluator(AddingModel::failing(10))
        .with_retry(RetryConfig::new(1).with_backoff(Duration::from_millis(10)).without_jitter())
        .evaluate_record(&record)
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.error.unwrap().contains("unavailable"));
    assert_eq!(outcome.trace.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_discards_partial_trace() {
    let records = vec![
        EvalRecord::new("slow 1 + 1").with_id("slow"),
        EvalRecord::new("What is 2 + 3?").with_id("fast").expecting_answer("5"),
    ];
    let sink = MemorySink::new();

    let summary = evaluator(AddingModel::default())
        .with_retry(RetryConfig::disabled())
        .with_timeout(Some(Duration::from_secs(5)))
        .evaluate(&records, &sink)
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    let outcomes = sink.outcomes();

    let slow = find(&outcomes, "slow");
    assert!(slow.error.as_deref().unwrap().contains("timed out"));
    assert!(slow.trace.is_empty());
    assert!(slow.agents_used.is_empty());

    let fast = find(&outcomes, "fast");
    assert!(fast.is_success());
    assert_eq!(fast.scores.response_quality, 1.0);
}

#[tokio::test]
async fn test_jsonl_sink_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outcomes.jsonl");
    let records: Vec<EvalRecord> = (1..=4)
        .map(|i| EvalRecord::new(format!("What is {} + {}?", i, i)).with_id(format!("r{}", i)))
        .collect();

    let sink = JsonlSink::create(&path).await.unwrap();
    evaluator(AddingModel::default())
        .with_concurrency(2)
        .evaluate(&records, &sink)
        .await
        .unwrap();
    drop(sink);

    let outcomes: Vec<EvalOutcome> = load_jsonl(&path).unwrap();
    assert_eq!(outcomes.len(), 4);
    for i in 1..=4 {
        let outcome = find(&outcomes, &format!("r{}", i));
        assert_eq!(
            outcome.trace.final_response().unwrap().content,
            format!("Answer: {}", i * 2)
        );
    }
}

#[tokio::test]
async fn test_recorded_runs_are_rescored_without_a_model() {
    let run = RecordedRun {
        record: EvalRecord::new("What is 2 + 3?")
            .expecting_agent("math_agent")
            .expecting_answer("5"),
        trace: ConversationTrace::from_messages(vec![
            Message::user("What is 2 + 3?"),
            Message::supervisor("2 + 3").with_attribution("math_agent"),
            Message::agent("5").with_attribution("math_agent"),
            Message::supervisor("Answer: 5"),
        ]),
    };

    let outcome = score_recorded(
        &TraceScorer::new(Arc::new(ReferenceJudge)),
        &run,
        &RetryConfig::disabled(),
    )
    .await;

    assert_eq!(outcome.attempts, 0);
    assert!(outcome.is_success());
    assert_eq!(outcome.scores.routing_accuracy, 1.0);
    assert_eq!(outcome.scores.response_quality, 1.0);
    assert_eq!(outcome.extras.tool_usage, 0.0);
    assert_eq!(outcome.extras.response_format, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_judge_outage_is_recorded_not_scored() {
    let grader = GradingModel::failing(usize::MAX);
    let scorer = TraceScorer::new(Arc::new(ModelJudge::new(grader.clone(), "gpt-4o-mini")));
    let records = vec![
        EvalRecord::new("What is 2 + 3?").with_id("math").expecting_answer("5"),
        EvalRecord::new("misroute 1 + 1").with_id("bad"),
    ];
    let sink = MemorySink::new();

    let summary = BatchEvaluator::new(graph(AddingModel::default()), scorer)
        .with_retry(RetryConfig::new(2).with_backoff(Duration::from_millis(10)).without_jitter())
        .evaluate(&records, &sink)
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    // One judge call plus two retries; the misrouted run never reaches the judge
    assert_eq!(grader.calls.load(Ordering::SeqCst), 3);

    let outcomes = sink.outcomes();
    let math = find(&outcomes, "math");
    assert!(!math.is_success());
    let error = math.error.as_deref().unwrap();
    assert!(error.contains("Scoring failed after 3 attempts"));
    assert!(error.contains("Rate limited"));
    assert_eq!(math.scores, ScoreReport::zero());
    assert_eq!(math.attempts, 1);
    // The run itself finished, so its trace is kept
    assert_eq!(math.trace.final_response().unwrap().content, "Answer: 5");
    assert_eq!(math.agents_used, vec!["math_agent"]);
}

#[tokio::test(start_paused = true)]
async fn test_judge_recovers_within_retries() {
    let grader = GradingModel::failing(1);
    let scorer = TraceScorer::new(Arc::new(ModelJudge::new(grader.clone(), "gpt-4o-mini")));
    let record = EvalRecord::new("What is 2 + 3?").expecting_answer("5");

    let outcome = BatchEvaluator::new(graph(AddingModel::default()), scorer)
        .with_retry(RetryConfig::new(2).with_backoff(Duration::from_millis(10)).without_jitter())
        .evaluate_record(&record)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.scores.response_quality, 1.0);
    assert_eq!(grader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_recorded_run_with_failing_judge_carries_the_error() {
    let run = RecordedRun {
        record: EvalRecord::new("hi"),
        trace: ConversationTrace::from_messages(vec![
            Message::user("hi"),
            Message::supervisor("Hello!"),
        ]),
    };
    let grader = GradingModel::failing(usize::MAX);
    let scorer = TraceScorer::new(Arc::new(ModelJudge::new(grader, "gpt-4o-mini")));

    let outcome = score_recorded(&scorer, &run, &RetryConfig::disabled()).await;

    assert!(outcome.error.unwrap().contains("Scoring failed after 1 attempts"));
    assert_eq!(outcome.scores, ScoreReport::zero());
    assert_eq!(outcome.trace.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_settings_drive_graph_and_evaluator() {
    let mut overrides = ConfigOverrides::default();
    overrides
        .agent_models
        .insert("math_agent".to_string(), Some("gpt-4o".to_string()));
    let settings = EvalSettings {
        concurrency: 2,
        timeout_secs: 5,
        retry: RetryConfig::disabled(),
        limits: GraphLimits::default().with_max_handoffs(0),
        overrides,
        ..Default::default()
    };

    let graph = settings.build_graph(&builder(AddingModel::default())).unwrap();
    assert_eq!(graph.agent("math_agent").unwrap().model_id(), "gpt-4o");
    assert_eq!(graph.limits().max_handoffs, 0);

    let evaluator = BatchEvaluator::from_settings(
        Arc::new(graph),
        settings.scorer(Arc::new(ReferenceJudge)),
        &settings,
    );
    let records = vec![
        EvalRecord::new("What is 2 + 3?").with_id("math"),
        EvalRecord::new("hi").with_id("greet"),
    ];
    let sink = MemorySink::new();
    let summary = evaluator.evaluate(&records, &sink).await.unwrap();

    assert_eq!(summary.failed, 1);
    let outcomes = sink.outcomes();
    let math = find(&outcomes, "math");
    assert!(math.error.as_deref().unwrap().contains("Hand-off limit of 0"));
    assert_eq!(math.attempts, 1);
    assert!(find(&outcomes, "greet").is_success());
}

#[test]
fn test_settings_reject_unknown_agent_override() {
    let mut overrides = ConfigOverrides::default();
    overrides
        .agent_prompts
        .insert("poet_agent".to_string(), Some("Rhyme.".to_string()));
    let settings = EvalSettings {
        overrides,
        ..Default::default()
    };

    let err = settings.build_graph(&builder(AddingModel::default())).unwrap_err();
    assert!(err.to_string().contains("poet_agent"));
}
