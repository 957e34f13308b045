//! Codehook - run fenced code blocks from a conversation and reply with the output.
//!
//! An [`Agent`] answers through an ordered [`ReplyChain`]. The
//! [`CodeBlockReplyHook`] is one such strategy: it pulls code blocks out of the
//! latest message, runs them through an [`InteractiveService`], and replies
//! with the collected output.

pub mod agent;
pub mod code_block;
pub mod config;
pub mod error;
pub mod hook;
pub mod interactive;
pub mod reply;

pub use agent::Agent;
pub use codehook_protocol::{Message, Role};
pub use crate::config::{AppConfig, ExecutorConfig, HookConfig};
pub use error::{ConfigError, ReplyError, ReplyResult};
pub use hook::{CodeBlockReplyHook, EXECUTION_MARKER};
pub use interactive::{
    InteractiveError, InteractiveResult, InteractiveService, ProcessInteractiveService,
    ProcessServiceConfig,
};
pub use reply::{AgentInfo, ReplyChain, ReplyPosition, ReplyStrategy};
