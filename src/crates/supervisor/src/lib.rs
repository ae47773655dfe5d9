//! # supervisor - Configurable Agent Routing
//!
//! A supervisor that routes each user request among specialized agents and
//! records everything that happened as a [`ConversationTrace`]:
//!
//! - **[Agents](agent)** - templates, resolved specs and the built-in catalog
//! - **[Configuration](config)** - validated overrides for prompts, descriptions and models
//! - **[Builder](builder)** - turns a configuration into an immutable [`RoutingGraph`]
//! - **[Graph](graph)** - the routing state machine
//! - **[Decision](decision)** - the supervisor's routing policy
//! - **[Cache](cache)** - shared graph for the default configuration
//! - **[Tools](tools)** and **[Model](llm)** - capabilities supplied by the caller
//!
//! # Overview
//!
//! ```text
//! ConfigOverrides ─> ConfigResolver ─> Configuration ─> SupervisorBuilder ─> RoutingGraph
//!                                                        (SupervisorCache)        │
//!                                                                                 ▼
//!                                                    user input ─> run() ─> ConversationTrace
//! ```
//!
//! The crate performs no network I/O. Model calls go through [`ChatModel`],
//! tools through [`Tool`]; both are provided by the caller.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use supervisor::{ConfigResolver, SupervisorBuilder, SupervisorCache};
//!
//! let builder = SupervisorBuilder::new(Arc::new(my_model)).with_tool(Arc::new(my_search));
//! let cache = SupervisorCache::new();
//!
//! let config = builder.resolver().resolve_map(&playground_params)?;
//! let graph = cache.get_or_build(&config, &builder)?;
//!
//! let trace = graph.run("What is 15 + 27?").await?;
//! println!("{}", trace.final_response().map(|m| m.content.as_str()).unwrap_or(""));
//! ```
//!
//! # Errors
//!
//! See [`error`] for the taxonomy. Run failures come back as [`RunFailure`]
//! with the partial trace attached.

pub mod agent;
pub mod builder;
pub mod cache;
pub mod config;
pub mod decision;
pub mod error;
pub mod graph;
pub mod llm;
pub mod messages;
pub mod tools;

pub use agent::{AgentCatalog, AgentSpec, AgentTemplate, DEFAULT_MODEL_ID, MATH_AGENT, RESEARCH_AGENT};
pub use builder::{GraphBuilder, SupervisorBuilder};
pub use cache::SupervisorCache;
pub use config::{ConfigOverrides, ConfigResolver, Configuration};
pub use decision::{Decision, DecisionRequest, ModelDecider, SupervisorDecider};
pub use error::{
    BuildError, ConfigurationError, Result, RunError, RunFailure, SupervisorError, ToolError,
    TransientError,
};
pub use graph::{GraphLimits, RoutingGraph, RunState};
pub use llm::{ChatModel, ChatRequest, ToolDefinition};
pub use messages::{ConversationTrace, Message, Role, ToolCall};
pub use tools::{Tool, ToolRegistry};
