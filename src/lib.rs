//! `github-retry-http` wraps `reqwest` with the retry policy GitHub's REST API
//! calls for.
//!
//! Two pure functions make every decision:
//! - [`classify`] decides whether an attempt is final or worth repeating.
//! - [`backoff`] picks the wait before the next attempt, honoring
//!   `Retry-After` and the `X-Ratelimit-*` headers.
//!
//! [`RetryingClient`] drives them in a bounded loop that observes a
//! [`RequestContext`] for cancellation and deadlines.

mod backoff;
mod classify;
mod client;
mod context;
mod error;
mod options;
mod outcome;

pub use backoff::{backoff, backoff_at, RATELIMIT_REMAINING, RATELIMIT_RESET};
pub use classify::{
    classify, fatal_transport_kind, is_fatal_transport_error, Decision, FatalTransport, Terminal,
};
pub use client::RetryingClient;
pub use context::{CancelHandle, ContextError, RequestContext};
pub use error::RetryError;
pub use options::{
    ClientOptions, RetryConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_MIN_BACKOFF,
    DEFAULT_TIMEOUT_MS,
};
pub use outcome::AttemptOutcome;

pub type Result<T> = std::result::Result<T, RetryError>;
