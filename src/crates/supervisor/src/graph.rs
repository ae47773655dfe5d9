//! Routing Graph - The Supervisor State Machine
//!
//! A [`RoutingGraph`] is the immutable product of
//! [`SupervisorBuilder::build`](crate::builder::SupervisorBuilder). Each call
//! to [`run`](RoutingGraph::run) drives one request through an explicit state
//! machine:
//!
//! ```text
//! AwaitingInput ──> RoutingDecision ──> AgentExecuting ──> SupervisorResponding
//!                        │   ▲                                   │
//!                        │   └──────────── hand-off ─────────────┤
//!                        ▼                                       ▼
//!                       Done <─────────── respond ───────────────┘
//! ```
//!
//! All per-run state (the trace and the hand-off counter) lives in the call,
//! so one graph can serve any number of concurrent runs.
//!
//! # Failure modes
//!
//! | Condition | Result |
//! |-----------|--------|
//! | decision names an unknown description | `RunError::Routing` |
//! | hand-off requested after `max_handoffs` hand-offs | `RunError::RunLimitExceeded` |
//! | model or decider infrastructure failure | `RunError::Transient` |
//! | tool fails or is unknown | error tool message, run continues |
//!
//! Every failure is returned as a [`RunFailure`] carrying the trace built up
//! to that point.

use crate::agent::AgentSpec;
use crate::decision::{Decision, DecisionRequest, SupervisorDecider, HANDOFF_TOOL};
use crate::error::{RunError, RunFailure, TransientError};
use crate::llm::{ChatModel, ChatRequest};
use crate::messages::{ConversationTrace, Message, Role, ToolCall};
use crate::tools::{render_output, ToolRegistry};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Bounds on a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphLimits {
    /// Hand-offs allowed per run; `0` forbids delegation
    pub max_handoffs: usize,
    /// Model calls allowed per agent turn
    pub max_agent_steps: usize,
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self {
            max_handoffs: 5,
            max_agent_steps: 10,
        }
    }
}

impl GraphLimits {
    pub fn with_max_handoffs(mut self, max_handoffs: usize) -> Self {
        self.max_handoffs = max_handoffs;
        self
    }

    pub fn with_max_agent_steps(mut self, max_agent_steps: usize) -> Self {
        self.max_agent_steps = max_agent_steps;
        self
    }
}

/// Observable phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    AwaitingInput,
    RoutingDecision,
    AgentExecuting,
    SupervisorResponding,
    Done,
}

/// An agent together with the tools it may call
#[derive(Debug, Clone)]
pub(crate) struct AgentHandle {
    pub(crate) spec: AgentSpec,
    pub(crate) tools: ToolRegistry,
}

enum Step {
    AwaitingInput,
    /// `Some` when the supervisor already decided while responding
    RoutingDecision(Option<Decision>),
    AgentExecuting { agent: usize, task: String },
    SupervisorResponding,
    Done,
}

impl Step {
    fn state(&self) -> RunState {
        match self {
            Step::AwaitingInput => RunState::AwaitingInput,
            Step::RoutingDecision(_) => RunState::RoutingDecision,
            Step::AgentExecuting { .. } => RunState::AgentExecuting,
            Step::SupervisorResponding => RunState::SupervisorResponding,
            Step::Done => RunState::Done,
        }
    }
}

struct RunContext {
    trace: ConversationTrace,
    handoffs: usize,
}

/// Immutable agent-dispatch graph
pub struct RoutingGraph {
    system_prompt: String,
    supervisor_model: String,
    agents: Vec<AgentHandle>,
    routes: HashMap<String, usize>,
    descriptions: Vec<String>,
    model: Arc<dyn ChatModel>,
    decider: Arc<dyn SupervisorDecider>,
    limits: GraphLimits,
}

impl RoutingGraph {
    /// Caller guarantees descriptions are unique
    pub(crate) fn new(
        system_prompt: String,
        supervisor_model: String,
        agents: Vec<AgentHandle>,
        model: Arc<dyn ChatModel>,
        decider: Arc<dyn SupervisorDecider>,
        limits: GraphLimits,
    ) -> Self {
        let descriptions: Vec<String> = agents
            .iter()
            .map(|agent| agent.spec.description().to_string())
            .collect();
        let routes = descriptions
            .iter()
            .enumerate()
            .map(|(index, description)| (description.clone(), index))
            .collect();

        Self {
            system_prompt,
            supervisor_model,
            agents,
            routes,
            descriptions,
            model,
            decider,
            limits,
        }
    }

    /// Resolved supervisor instructions
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Resolved supervisor model id
    pub fn supervisor_model(&self) -> &str {
        &self.supervisor_model
    }

    /// Agent specs in routing-table order
    pub fn agent_specs(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.iter().map(|agent| &agent.spec)
    }

    /// Look up an agent by name
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agent_specs().find(|spec| spec.name() == name)
    }

    /// Routing descriptions in routing-table order
    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    pub fn limits(&self) -> GraphLimits {
        self.limits
    }

    /// Answer a single user request
    pub async fn run(&self, input: impl Into<String>) -> Result<ConversationTrace, RunFailure> {
        self.run_messages(vec![Message::user(input)]).await
    }

    /// Continue a conversation; the last user message is the turn input.
    ///
    /// The returned trace starts with `history`.
    #[instrument(skip_all, fields(agents = self.agents.len(), history = history.len()))]
    pub async fn run_messages(&self, history: Vec<Message>) -> Result<ConversationTrace, RunFailure> {
        let mut run = RunContext {
            trace: ConversationTrace::from_messages(history),
            handoffs: 0,
        };
        let mut step = Step::AwaitingInput;

        loop {
            debug!(state = ?step.state(), handoffs = run.handoffs, "Run transition");
            step = match step {
                Step::Done => return Ok(run.trace),
                current => match self.advance(current, &mut run).await {
                    Ok(next) => next,
                    Err(error) => {
                        warn!(%error, "Run failed");
                        return Err(RunFailure {
                            error,
                            trace: run.trace,
                        });
                    }
                },
            };
        }
    }

    async fn advance(&self, step: Step, run: &mut RunContext) -> Result<Step, RunError> {
        match step {
            Step::AwaitingInput => {
                if !run.trace.iter().any(Message::is_user) {
                    return Err(RunError::InvalidInput(
                        "history contains no user message".to_string(),
                    ));
                }
                Ok(Step::RoutingDecision(None))
            }
            Step::RoutingDecision(pending) => {
                let decision = match pending {
                    Some(decision) => decision,
                    None => self.decide(&run.trace).await?,
                };
                match decision {
                    Decision::Respond { content } => {
                        run.trace.push(Message::supervisor(content));
                        Ok(Step::Done)
                    }
                    Decision::HandOff { target, task } => self.hand_off(target, task, run),
                }
            }
            Step::AgentExecuting { agent, task } => {
                self.execute_agent(&self.agents[agent], &task, &mut run.trace)
                    .await?;
                Ok(Step::SupervisorResponding)
            }
            Step::SupervisorResponding => match self.decide(&run.trace).await? {
                Decision::Respond { content } => {
                    run.trace.push(Message::supervisor(content));
                    Ok(Step::Done)
                }
                handoff => Ok(Step::RoutingDecision(Some(handoff))),
            },
            Step::Done => Ok(Step::Done),
        }
    }

    async fn decide(&self, trace: &ConversationTrace) -> Result<Decision, TransientError> {
        self.decider
            .decide(DecisionRequest {
                system_prompt: &self.system_prompt,
                model_id: &self.supervisor_model,
                descriptions: &self.descriptions,
                trace,
            })
            .await
    }

    fn hand_off(&self, target: String, task: String, run: &mut RunContext) -> Result<Step, RunError> {
        let Some(&agent) = self.routes.get(&target) else {
            return Err(RunError::Routing { target });
        };
        if run.handoffs >= self.limits.max_handoffs {
            return Err(RunError::RunLimitExceeded {
                limit: self.limits.max_handoffs,
            });
        }
        run.handoffs += 1;

        let name = self.agents[agent].spec.name();
        debug!(agent = name, "Handing off");
        let call = ToolCall::new(
            format!("handoff_{}", run.handoffs),
            HANDOFF_TOOL,
            json!({"agent": target, "task": &task}),
        );
        run.trace.push(
            Message::supervisor(task.as_str())
                .with_attribution(name)
                .with_tool_calls(vec![call]),
        );

        Ok(Step::AgentExecuting { agent, task })
    }

    /// Agent turn: the hand-off task plus the agent's own tool loop
    async fn execute_agent(
        &self,
        agent: &AgentHandle,
        task: &str,
        trace: &mut ConversationTrace,
    ) -> Result<(), TransientError> {
        let name = agent.spec.name();
        let definitions = agent.tools.definitions();
        let mut history = vec![Message::user(task)];

        for step in 1..=self.limits.max_agent_steps {
            let request = ChatRequest::new(agent.spec.model_id(), agent.spec.prompt())
                .with_tools(definitions.clone())
                .with_messages(history.clone());

            let mut reply = self.model.generate(request).await?;
            reply.role = Role::Agent;
            reply.agent_attribution = Some(name.to_string());
            trace.push(reply.clone());

            if !reply.has_tool_calls() {
                return Ok(());
            }
            if step == self.limits.max_agent_steps {
                warn!(agent = name, steps = step, "Agent step limit reached");
                return Ok(());
            }

            let results = join_all(
                reply
                    .tool_calls
                    .iter()
                    .map(|call| invoke_tool(&agent.tools, name, call)),
            )
            .await;

            history.push(reply);
            for result in results {
                trace.push(result.clone());
                history.push(result);
            }
        }

        Ok(())
    }
}

async fn invoke_tool(tools: &ToolRegistry, agent: &str, call: &ToolCall) -> Message {
    match tools.invoke(&call.name, call.args.clone()).await {
        Ok(output) => Message::tool(render_output(&output), call.id.as_str()).with_attribution(agent),
        Err(error) => {
            debug!(agent, tool = %call.name, %error, "Tool failed");
            Message::tool(json!({ "error": error.to_string() }).to_string(), call.id.as_str())
                .with_attribution(agent)
                .as_error()
        }
    }
}

impl std::fmt::Debug for RoutingGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingGraph")
            .field("supervisor_model", &self.supervisor_model)
            .field("agents", &self.agents.iter().map(|a| a.spec.name()).collect::<Vec<_>>())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Scripted(Mutex<VecDeque<Decision>>);

    impl Scripted {
        fn new(decisions: Vec<Decision>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(decisions.into())))
        }
    }

    #[async_trait]
    impl SupervisorDecider for Scripted {
        async fn decide(&self, _request: DecisionRequest<'_>) -> Result<Decision, TransientError> {
            Ok(self
                .0
                .lock()
                .pop_front()
                .unwrap_or_else(|| Decision::respond("done")))
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn generate(&self, request: ChatRequest) -> Result<Message, TransientError> {
            Ok(Message::agent(format!("handled: {}", request.messages[0].content)))
        }
    }

    fn graph(decider: Arc<dyn SupervisorDecider>, limits: GraphLimits) -> RoutingGraph {
        let spec = crate::agent::AgentTemplate::new("echo_agent", "Echoes", "Echo.").apply(None, None, None);
        RoutingGraph::new(
            "Route.".into(),
            "gpt-4o-mini".into(),
            vec![AgentHandle {
                spec,
                tools: ToolRegistry::new(),
            }],
            Arc::new(EchoModel),
            decider,
            limits,
        )
    }

    #[tokio::test]
    async fn test_direct_response() {
        let graph = graph(Scripted::new(vec![Decision::respond("hi")]), GraphLimits::default());
        let trace = graph.run("hello").await.unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.final_response().unwrap().content, "hi");
        assert_eq!(trace.handoff_count(), 0);
    }

    #[tokio::test]
    async fn test_single_handoff() {
        let graph = graph(
            Scripted::new(vec![Decision::hand_off("Echoes", "say hi"), Decision::respond("ok")]),
            GraphLimits::default(),
        );
        let trace = graph.run("hello").await.unwrap();
        let roles: Vec<Role> = trace.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Supervisor, Role::Agent, Role::Supervisor]
        );
        assert_eq!(trace.messages()[2].content, "handled: say hi");
        assert_eq!(trace.messages()[2].agent_attribution.as_deref(), Some("echo_agent"));
        assert_eq!(trace.messages()[1].tool_calls[0].name, HANDOFF_TOOL);
    }

    #[tokio::test]
    async fn test_zero_handoffs_allowed() {
        let graph = graph(
            Scripted::new(vec![Decision::hand_off("Echoes", "x")]),
            GraphLimits::default().with_max_handoffs(0),
        );
        let failure = graph.run("hello").await.unwrap_err();
        assert_eq!(failure.error, RunError::RunLimitExceeded { limit: 0 });
        assert_eq!(failure.trace.len(), 1);
    }

    #[tokio::test]
    async fn test_history_without_user_turn() {
        let graph = graph(Scripted::new(vec![]), GraphLimits::default());
        let failure = graph
            .run_messages(vec![Message::supervisor("hello")])
            .await
            .unwrap_err();
        assert!(matches!(failure.error, RunError::InvalidInput(_)));
    }

    #[test]
    fn test_default_limits() {
        let limits = GraphLimits::default();
        assert_eq!(limits.max_handoffs, 5);
        assert_eq!(limits.max_agent_steps, 10);
    }
}
