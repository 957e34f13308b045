//! Reply strategies and the chain that consults them.
//!
//! An agent produces its next message by walking an ordered list of
//! strategies. Each one either declines (`Ok(None)`) or produces a message,
//! which ends the walk. Errors end the walk too and reach the caller unchanged.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use codehook_protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{ReplyError, ReplyResult};

/// Identity of the agent a strategy is replying for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInfo {
    pub name: String,
}

impl AgentInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A unit of reply logic an agent consults, in order, to produce its next message.
#[async_trait]
pub trait ReplyStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produce a reply for `history`, or `None` when this strategy does not apply.
    async fn generate_reply(
        &self,
        agent: &AgentInfo,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> ReplyResult<Option<Message>>;
}

/// Where a newly registered strategy goes in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyPosition {
    /// Consulted before everything registered so far.
    #[default]
    Front,
    /// Consulted after everything registered so far.
    Back,
    /// Inserted at this index, clamped to the chain length.
    Index(usize),
}

/// Ordered list of reply strategies.
#[derive(Clone, Default)]
pub struct ReplyChain {
    strategies: Vec<Arc<dyn ReplyStrategy>>,
}

impl fmt::Debug for ReplyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ReplyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Arc<dyn ReplyStrategy>, position: ReplyPosition) {
        let index = match position {
            ReplyPosition::Front => 0,
            ReplyPosition::Back => self.strategies.len(),
            ReplyPosition::Index(i) => i.min(self.strategies.len()),
        };
        debug!(strategy = strategy.name(), index, "registering reply strategy");
        self.strategies.insert(index, strategy);
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy names in consultation order.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Consult each strategy in order; the first produced message wins.
    pub async fn generate(
        &self,
        agent: &AgentInfo,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> ReplyResult<Option<Message>> {
        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Err(ReplyError::Cancelled);
            }
            trace!(strategy = strategy.name(), "consulting reply strategy");
            if let Some(reply) = strategy.generate_reply(agent, history, cancel).await? {
                debug!(strategy = strategy.name(), "reply produced");
                return Ok(Some(reply));
            }
        }
        Ok(None)
    }
}
