//! Cancellation and deadline signal for one logical request.

use std::time::Duration;

use tokio::{
    sync::watch,
    time::{sleep_until, Instant},
};

/// Why a request context is done.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Carries an optional cancel flag and an optional deadline.
///
/// Cloning is cheap; clones observe the same cancel flag.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Fires the cancel flag of the contexts created alongside it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a cancellable copy of this context and the handle that cancels it.
    pub fn with_cancel(self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            cancel: Some(rx),
            ..self
        };
        (ctx, CancelHandle { tx })
    }

    /// Sets a deadline `timeout` from now. An earlier existing deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports whether the context is already done. Cancellation wins over an
    /// expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(ContextError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(ContextError::DeadlineExceeded);
        }
        None
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Pending forever for a background context.
    pub async fn done(&self) -> ContextError {
        let cancelled = async {
            if let Some(mut rx) = self.cancel.clone() {
                // A dropped handle can never cancel.
                let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
                if fired {
                    return ContextError::Cancelled;
                }
            }
            std::future::pending().await
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => {
                    sleep_until(deadline).await;
                    ContextError::DeadlineExceeded
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            err = cancelled => err,
            err = expired => err,
        }
    }
}
