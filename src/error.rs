use std::io;
use thiserror::Error;

/// Core error type for buglocator.
#[derive(Error, Debug)]
pub enum BugLocatorError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("validation error on '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("git error: {message}")]
    Git { message: String },

    #[error("malformed diff between '{from}' and '{to}': {line}")]
    MalformedDiff {
        from: String,
        to: String,
        line: String,
    },

    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error("malformed {what}: {message}")]
    MalformedInput { what: String, message: String },

    #[error("malformed normalization bounds: {message}")]
    MalformedBounds { message: String },

    #[error("{stage}: expected {expected} scores but got {actual}")]
    ScoreCountMismatch {
        stage: String,
        expected: usize,
        actual: usize,
    },

    #[error("rank learner failed: {message}")]
    Learner { message: String },
}

/// Failure to tokenize a single source document.
///
/// Recovered per file by the corpus: the document is skipped and the
/// index carries on without it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot tokenize '{path}': {message}")]
pub struct TokenizeError {
    pub path: String,
    pub message: String,
}

impl TokenizeError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl BugLocatorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    pub fn malformed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn bounds(message: impl Into<String>) -> Self {
        Self::MalformedBounds {
            message: message.into(),
        }
    }

    pub fn learner(message: impl Into<String>) -> Self {
        Self::Learner {
            message: message.into(),
        }
    }

    /// Returns true if this error is caused by user input (vs internal/system).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. } | Self::Validation { .. } | Self::MalformedInput { .. }
        )
    }

    /// Returns true if this error breaks a structural contract of the
    /// pipeline (qid/score alignment, diff parsing, persisted bounds).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedDiff { .. }
                | Self::ScoreCountMismatch { .. }
                | Self::MalformedBounds { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BugLocatorError>;
