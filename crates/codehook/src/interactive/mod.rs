//! Interactive code execution seam.
//!
//! The reply hook never runs code itself. It hands each block to an
//! [`InteractiveService`] and waits for the textual result. How the service
//! isolates, times out, or reuses sessions is entirely its own business.
//!
//! ```text
//! ┌──────────────────────┐   submit_code(block, cancel)   ┌──────────────────────┐
//! │  CodeBlockReplyHook  │ ─────────────────────────────▶ │  InteractiveService  │
//! │                      │ ◀───────────────────────────── │  (process, kernel…)  │
//! └──────────────────────┘     Option<String> | error     └──────────────────────┘
//! ```

mod process;

pub use process::{ProcessInteractiveService, ProcessServiceConfig};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors raised by an execution collaborator.
#[derive(Error, Debug)]
pub enum InteractiveError {
    #[error("failed to start interpreter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution failed: {0}")]
    Failed(String),
}

pub type InteractiveResult<T> = Result<T, InteractiveError>;

/// An external service that runs source text and reports its output.
#[async_trait]
pub trait InteractiveService: Send + Sync {
    /// Submit `code` for execution and wait for its output.
    ///
    /// Returns `Ok(None)` when the code ran but produced no output.
    /// Implementations must stop work promptly once `cancel` fires.
    async fn submit_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> InteractiveResult<Option<String>>;
}
