//! Conversational agent that answers through its reply chain.

use std::sync::Arc;

use codehook_protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::HookConfig;
use crate::error::{ConfigError, ReplyResult};
use crate::hook::CodeBlockReplyHook;
use crate::interactive::InteractiveService;
use crate::reply::{AgentInfo, ReplyChain, ReplyPosition, ReplyStrategy};

#[derive(Debug, Clone)]
pub struct Agent {
    info: AgentInfo,
    chain: ReplyChain,
    default_reply: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: AgentInfo::new(name),
            chain: ReplyChain::new(),
            default_reply: None,
        }
    }

    /// Reply sent when every strategy declines.
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &AgentInfo {
        &self.info
    }

    pub fn chain(&self) -> &ReplyChain {
        &self.chain
    }

    /// Register a strategy ahead of all existing ones.
    pub fn register_reply(&mut self, strategy: Arc<dyn ReplyStrategy>) -> &mut Self {
        self.register_reply_at(strategy, ReplyPosition::Front)
    }

    pub fn register_reply_at(
        &mut self,
        strategy: Arc<dyn ReplyStrategy>,
        position: ReplyPosition,
    ) -> &mut Self {
        self.chain.register(strategy, position);
        self
    }

    /// Attach a [`CodeBlockReplyHook`] that runs blocks through `service`.
    pub fn register_code_block_execution_hook(
        &mut self,
        service: Arc<dyn InteractiveService>,
        config: HookConfig,
    ) -> Result<&mut Self, ConfigError> {
        let hook = CodeBlockReplyHook::new(service, config)?;
        Ok(self.register_reply(Arc::new(hook)))
    }

    /// Produce the next message for `history`.
    ///
    /// Returns `Ok(None)` when no strategy applies and no default reply is set.
    pub async fn generate_reply(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> ReplyResult<Option<Message>> {
        if let Some(reply) = self.chain.generate(&self.info, history, cancel).await? {
            return Ok(Some(reply));
        }

        debug!(agent = %self.info.name, "no strategy produced a reply");
        Ok(self
            .default_reply
            .as_ref()
            .map(|text| Message::assistant(text.clone(), self.info.name.clone())))
    }

    /// Append `message` to a copy of `history` and reply to it.
    pub async fn send(
        &self,
        history: &[Message],
        message: Message,
        cancel: &CancellationToken,
    ) -> ReplyResult<Option<Message>> {
        let mut conversation = history.to_vec();
        conversation.push(message);
        self.generate_reply(&conversation, cancel).await
    }
}
