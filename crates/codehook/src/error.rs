use thiserror::Error;

use crate::interactive::InteractiveError;

/// Errors that end a reply attempt.
#[derive(Error, Debug)]
pub enum ReplyError {
    /// The execution collaborator failed; its error is carried unchanged.
    #[error(transparent)]
    Execution(#[from] InteractiveError),

    #[error("reply generation cancelled")]
    Cancelled,
}

pub type ReplyResult<T> = Result<T, ReplyError>;

/// Invalid configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    EmptyMarker { field: &'static str },

    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_execution(err: &ReplyError) -> bool {
        match err {
            ReplyError::Execution(_) => true,
            ReplyError::Cancelled => false,
        }
    }

    #[test]
    fn test_execution_error_is_transparent() {
        let err: ReplyError = InteractiveError::Failed("kernel died".to_string()).into();
        assert!(is_execution(&err));
        assert_eq!(err.to_string(), InteractiveError::Failed("kernel died".to_string()).to_string());
        assert!(!is_execution(&ReplyError::Cancelled));
        assert_eq!(ReplyError::Cancelled.to_string(), "reply generation cancelled");
    }
}
