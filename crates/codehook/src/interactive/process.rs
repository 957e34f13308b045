//! Process-backed interactive service.
//!
//! Each submission runs in a fresh interpreter process: `program args... <code>`.
//! There is no session state between submissions.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{InteractiveError, InteractiveResult, InteractiveService};

/// Settings for [`ProcessInteractiveService`].
#[derive(Debug, Clone)]
pub struct ProcessServiceConfig {
    /// Interpreter binary (e.g. "sh", "python3", "node").
    pub program: String,
    /// Arguments placed before the code (e.g. `["-c"]`).
    pub args: Vec<String>,
    /// Per-submission wall clock limit.
    pub timeout: Duration,
    /// Working directory for the interpreter.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl Default for ProcessServiceConfig {
    fn default() -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
            timeout: Duration::from_secs(30),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// Runs code blocks through a local interpreter process.
#[derive(Debug, Clone, Default)]
pub struct ProcessInteractiveService {
    config: ProcessServiceConfig,
}

impl ProcessInteractiveService {
    pub fn new(config: ProcessServiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessServiceConfig {
        &self.config
    }

    fn command(&self, code: &str) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.config.env);
        cmd
    }
}

#[async_trait]
impl InteractiveService for ProcessInteractiveService {
    async fn submit_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> InteractiveResult<Option<String>> {
        if cancel.is_cancelled() {
            return Err(InteractiveError::Cancelled);
        }

        let child = self
            .command(code)
            .spawn()
            .map_err(|source| InteractiveError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        debug!(program = %self.config.program, pid = ?child.id(), "interpreter started");

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("submission cancelled, killing interpreter");
                return Err(InteractiveError::Cancelled);
            }
            result = tokio::time::timeout(self.config.timeout, child.wait_with_output()) => {
                match result {
                    Ok(output) => output?,
                    Err(_) => {
                        warn!(timeout_secs = self.config.timeout.as_secs(), "interpreter timed out");
                        return Err(InteractiveError::Timeout {
                            secs: self.config.timeout.as_secs(),
                        });
                    }
                }
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        if !output.status.success() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            match output.status.code() {
                Some(code) => text.push_str(&format!("exit code: {code}")),
                None => text.push_str("terminated by signal"),
            }
        }

        debug!(status = %output.status, bytes = text.len(), "interpreter finished");

        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(timeout: Duration) -> ProcessInteractiveService {
        ProcessInteractiveService::new(ProcessServiceConfig {
            timeout,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_stdout_is_returned() {
        let service = sh(Duration::from_secs(10));
        let out = service
            .submit_code("echo hello", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("hello\n"));
    }

    #[tokio::test]
    async fn test_silent_code_returns_none() {
        let service = sh(Duration::from_secs(10));
        let out = service
            .submit_code("true", &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_stderr_and_exit_code_are_reported() {
        let service = sh(Duration::from_secs(10));
        let out = service
            .submit_code("echo out; echo err >&2; exit 3", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, "out\nerr\nexit code: 3");
    }

    #[tokio::test]
    async fn test_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("CODEHOOK_TEST_VALUE".to_string(), "42".to_string());
        let service = ProcessInteractiveService::new(ProcessServiceConfig {
            working_dir: Some(dir.path().to_path_buf()),
            env,
            ..Default::default()
        });

        let out = service
            .submit_code("echo $CODEHOOK_TEST_VALUE; touch marker", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("42\n"));
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_timeout() {
        let service = sh(Duration::from_millis(100));
        let err = service
            .submit_code("sleep 5", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InteractiveError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancel_before_submit() {
        let service = sh(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = service.submit_code("echo never", &cancel).await.unwrap_err();
        assert!(matches!(err, InteractiveError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_during_execution() {
        let service = sh(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = service.submit_code("sleep 10", &cancel).await.unwrap_err();
        assert!(matches!(err, InteractiveError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let service = ProcessInteractiveService::new(ProcessServiceConfig {
            program: "codehook-no-such-interpreter".to_string(),
            ..Default::default()
        });
        let err = service
            .submit_code("1", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, InteractiveError::Spawn { .. }));
    }
}
