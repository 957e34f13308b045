//! Reply strategy that runs fenced code blocks from the latest message.
//!
//! The hook looks only at the most recent message. Every complete block in it
//! is submitted, one at a time, to the configured [`InteractiveService`], and
//! the outputs are concatenated into a single assistant reply:
//!
//! ```text
//! // [CODE_BLOCK_EXECUTION]
//! ### Executing result for code block 0
//! <output>
//! ### End of executing result ###
//! ```
//!
//! The reply is cut to `maximum_output_to_keep` characters.

use std::sync::Arc;

use async_trait::async_trait;
use codehook_protocol::{Message, Role};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::code_block::{extract_code_blocks, split_fragments, truncate_chars};
use crate::config::HookConfig;
use crate::error::{ConfigError, ReplyError, ReplyResult};
use crate::interactive::InteractiveService;
use crate::reply::{AgentInfo, ReplyStrategy};

/// First line of every reply produced by the hook.
pub const EXECUTION_MARKER: &str = "// [CODE_BLOCK_EXECUTION]";

/// Reply strategy that executes the code blocks of the latest message.
pub struct CodeBlockReplyHook {
    service: Arc<dyn InteractiveService>,
    config: HookConfig,
}

impl std::fmt::Debug for CodeBlockReplyHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeBlockReplyHook")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CodeBlockReplyHook {
    pub fn new(
        service: Arc<dyn InteractiveService>,
        config: HookConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { service, config })
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }
}

#[async_trait]
impl ReplyStrategy for CodeBlockReplyHook {
    fn name(&self) -> &str {
        "code_block_execution"
    }

    async fn generate_reply(
        &self,
        agent: &AgentInfo,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> ReplyResult<Option<Message>> {
        let Some(content) = history.last().and_then(Message::text) else {
            debug!("no text in latest message, hook not applicable");
            return Ok(None);
        };

        let prefix = &self.config.code_block_prefix;
        if !content.contains(prefix.as_str()) || split_fragments(content, prefix).is_empty() {
            debug!("no code block prefix in latest message, hook not applicable");
            return Ok(None);
        }

        let mut output = String::new();
        output.push_str(EXECUTION_MARKER);
        output.push('\n');

        let mut index = 0usize;
        for code in extract_code_blocks(content, prefix, &self.config.code_block_suffix) {
            if cancel.is_cancelled() {
                debug!(completed = index, "cancelled before next submission");
                return Err(ReplyError::Cancelled);
            }

            debug!(bytes = code.len(), "submitting code block");
            if let Some(result) = self.service.submit_code(code, cancel).await? {
                output.push_str(&format!(
                    "### Executing result for code block {index}\n{result}\n### End of executing result ###\n"
                ));
                index += 1;
            }
        }

        let content = truncate_chars(&output, self.config.maximum_output_to_keep);
        info!(
            agent = %agent.name,
            blocks_with_output = index,
            chars = content.chars().count(),
            "code block reply produced"
        );

        Ok(Some(Message::new(
            Role::Assistant,
            Some(content.to_string()),
            agent.name.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::interactive::{InteractiveError, InteractiveResult};

    /// Echoes back a canned output and records every submission.
    #[derive(Default)]
    struct Recorder {
        output: Option<String>,
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl InteractiveService for Recorder {
        async fn submit_code(
            &self,
            code: &str,
            _cancel: &CancellationToken,
        ) -> InteractiveResult<Option<String>> {
            self.submitted.lock().unwrap().push(code.to_string());
            Ok(self.output.clone())
        }
    }

    fn hook(service: Arc<Recorder>, config: HookConfig) -> CodeBlockReplyHook {
        CodeBlockReplyHook::new(service, config).unwrap()
    }

    async fn reply(hook: &CodeBlockReplyHook, content: &str) -> Option<Message> {
        hook.generate_reply(
            &AgentInfo::new("coder"),
            &[Message::user(content, "user")],
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_blank_block_produces_header_only() {
        let service = Arc::new(Recorder {
            output: Some("unused".to_string()),
            ..Default::default()
        });
        let hook = hook(service.clone(), HookConfig::default());

        let msg = reply(&hook, "```csharp   ```").await.unwrap();
        assert_eq!(msg.text(), Some("// [CODE_BLOCK_EXECUTION]\n"));
        assert!(service.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_without_prefix_is_not_applicable() {
        let service = Arc::new(Recorder {
            output: Some("unused".to_string()),
            ..Default::default()
        });
        let hook = hook(service.clone(), HookConfig::default());

        assert!(reply(&hook, "no code here").await.is_none());
        // A suffix alone does not make a block.
        assert!(reply(&hook, "print(1)\n```").await.is_none());
        assert!(service.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_none_result_is_not_counted() {
        let service = Arc::new(Recorder::default());
        let hook = hook(service.clone(), HookConfig::default());

        let msg = reply(&hook, "```csharp\nvar x = 1;\n```").await.unwrap();
        assert_eq!(msg.text(), Some("// [CODE_BLOCK_EXECUTION]\n"));
        assert_eq!(*service.submitted.lock().unwrap(), vec!["var x = 1;"]);
    }

    #[tokio::test]
    async fn test_reply_metadata() {
        let service = Arc::new(Recorder {
            output: Some("1".to_string()),
            ..Default::default()
        });
        let hook = hook(service, HookConfig::default());

        let msg = reply(&hook, "```csharp 1 ```").await.unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.from, "coder");
        assert_eq!(
            msg.text(),
            Some(
                "// [CODE_BLOCK_EXECUTION]\n\
                 ### Executing result for code block 0\n\
                 1\n\
                 ### End of executing result ###\n"
            )
        );
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        struct Broken;

        #[async_trait]
        impl InteractiveService for Broken {
            async fn submit_code(
                &self,
                _code: &str,
                _cancel: &CancellationToken,
            ) -> InteractiveResult<Option<String>> {
                Err(InteractiveError::Failed("kernel died".to_string()))
            }
        }

        let hook = CodeBlockReplyHook::new(Arc::new(Broken), HookConfig::default()).unwrap();
        let err = hook
            .generate_reply(
                &AgentInfo::new("coder"),
                &[Message::user("```csharp 1 ```", "user")],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReplyError::Execution(InteractiveError::Failed(ref m)) if m == "kernel died"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = CodeBlockReplyHook::new(
            Arc::new(Recorder::default()),
            HookConfig::default().with_suffix(""),
        );
        assert!(result.is_err());
    }
}
