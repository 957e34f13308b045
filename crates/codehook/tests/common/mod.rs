//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use codehook::{InteractiveError, InteractiveResult, InteractiveService};
use tokio_util::sync::CancellationToken;

/// Interactive service that answers from a script instead of running code.
#[derive(Default)]
pub struct ScriptedService {
    answers: HashMap<String, Option<String>>,
    failures: HashMap<String, String>,
    /// Cancel this token after the given number of submissions.
    cancel_after: Option<(usize, CancellationToken)>,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `code` with `output`.
    pub fn answer(mut self, code: &str, output: &str) -> Self {
        self.answers
            .insert(code.to_string(), Some(output.to_string()));
        self
    }

    /// Run `code` but report no output.
    pub fn silent(mut self, code: &str) -> Self {
        self.answers.insert(code.to_string(), None);
        self
    }

    /// Fail when `code` is submitted.
    pub fn fail(mut self, code: &str, message: &str) -> Self {
        self.failures.insert(code.to_string(), message.to_string());
        self
    }

    pub fn cancel_after(mut self, submissions: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((submissions, token));
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractiveService for ScriptedService {
    async fn submit_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> InteractiveResult<Option<String>> {
        if cancel.is_cancelled() {
            return Err(InteractiveError::Cancelled);
        }

        let count = {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(code.to_string());
            submitted.len()
        };

        if let Some((_, token)) = self
            .cancel_after
            .as_ref()
            .filter(|(after, _)| count >= *after)
        {
            token.cancel();
        }

        if let Some(message) = self.failures.get(code) {
            return Err(InteractiveError::Failed(message.clone()));
        }

        Ok(self
            .answers
            .get(code)
            .cloned()
            .unwrap_or_else(|| Some(format!("ran: {code}"))))
    }
}
