//! Default-configuration graph cache.
//!
//! Building a graph is cheap but not free, and chat front-ends ask for the
//! default supervisor on every request. [`SupervisorCache`] keeps a single
//! shared graph for configurations the builder reports as default
//! ([`GraphBuilder::is_default_config`]) and builds every other
//! configuration fresh.
//!
//! The cache is an ordinary value: put it in whatever process context owns the
//! builder. Its slot lives as long as the cache does.

use crate::builder::GraphBuilder;
use crate::config::Configuration;
use crate::error::BuildError;
use crate::graph::RoutingGraph;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Lazily built, shared graph for the default configuration
#[derive(Debug, Default)]
pub struct SupervisorCache {
    slot: Mutex<Option<Arc<RoutingGraph>>>,
}

impl SupervisorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph for `config`.
    ///
    /// Default configurations share one instance, built at most once even
    /// when callers race: the first caller builds while holding the slot
    /// lock and the others wait for it. A failed build leaves the slot empty
    /// so the next caller tries again. Non-default configurations never touch
    /// the slot.
    pub fn get_or_build<B>(
        &self,
        config: &Configuration,
        builder: &B,
    ) -> Result<Arc<RoutingGraph>, BuildError>
    where
        B: GraphBuilder + ?Sized,
    {
        if !builder.is_default_config(config) {
            debug!("Building graph for custom configuration");
            return builder.build(config).map(Arc::new);
        }

        let mut slot = self.slot.lock();
        if let Some(graph) = slot.as_ref() {
            return Ok(Arc::clone(graph));
        }

        debug!("Building default graph");
        let graph = Arc::new(builder.build(config)?);
        *slot = Some(Arc::clone(&graph));
        Ok(graph)
    }

    /// Whether the default graph has been built
    pub fn is_populated(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Drop the cached default graph; the next default request rebuilds it
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}
