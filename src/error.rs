use crate::ContextError;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    /// The request context was cancelled or its deadline passed.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Non-retryable HTTP status with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Retryable server status (0 or 5xx other than 501) seen on the last attempt.
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },
    /// Every allowed attempt failed with a retryable outcome.
    #[error("giving up after {attempts} attempt(s): {last}")]
    GaveUp {
        attempts: u32,
        #[source]
        last: Box<RetryError>,
    },
    /// The request body is a stream and cannot be re-sent.
    #[error("request body cannot be replayed for retry")]
    NotReplayable,
}

impl RetryError {
    /// HTTP status of the outcome behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            RetryError::Http { status, .. } | RetryError::UnexpectedStatus { status } => {
                Some(*status)
            }
            RetryError::GaveUp { last, .. } => last.status(),
            RetryError::Transport(err) => err.status().map(|status| status.as_u16()),
            RetryError::Context(_) | RetryError::NotReplayable => None,
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, RetryError::Context(_))
    }
}
