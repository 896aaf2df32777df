use thiserror::Error;

use crate::context::ContextError;

/// Outcome error of a submission, as seen by the producer.
///
/// `E` is the handler's own error type and is passed through untouched.
#[derive(Debug, Error)]
pub enum QueueError<E> {
    #[error("queue closed")]
    Closed,
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("{0}")]
    Handler(E),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl<E> QueueError<E> {
    #[inline]
    pub fn is_closed(&self) -> bool {
        matches!(self, QueueError::Closed)
    }

    /// Context error, if the submitter's own context ended the wait.
    pub fn context(&self) -> Option<ContextError> {
        match self {
            QueueError::Context(e) => Some(*e),
            _ => None,
        }
    }

    /// Handler error, if the handler ran and failed.
    pub fn into_handler(self) -> Option<E> {
        match self {
            QueueError::Handler(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("queue capacity must be positive")]
    ZeroCapacity,
}
