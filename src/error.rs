use thiserror::Error;

/// Request parameters could not be decoded into an [`InputModel`](crate::InputModel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request parameters: {reason}")]
pub struct FormDecodeError {
    reason: String,
}

impl FormDecodeError {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The generation capability rejected a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PatternCompileError {
    message: String,
}

impl PatternCompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
