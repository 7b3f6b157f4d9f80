//! Decides whether an attempt is final or worth repeating.
//!
//! The transport does not give redirect exhaustion, bad schemes, or
//! untrusted certificates their own error types, so those three are
//! recognized by matching the messages of the error and its sources. The
//! patterns below are best-effort and need revisiting when the transport
//! (reqwest, hyper, rustls, native-tls) changes its wording.

use std::{error::Error, fmt, sync::LazyLock};

use regex::Regex;

use crate::{AttemptOutcome, ContextError, RequestContext};

static REDIRECTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(stopped after \d+ redirects\z|too many redirects)")
        .expect("redirect pattern is valid")
});

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(unsupported protocol scheme|url scheme is not allowed)")
        .expect("scheme pattern is valid")
});

static NOT_TRUSTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(certificate is not trusted|unknown authority|UnknownIssuer|unable to get local issuer certificate)",
    )
    .expect("trust pattern is valid")
});

/// Transport failures that will not go away by trying again.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FatalTransport {
    TooManyRedirects,
    UnsupportedScheme,
    UntrustedCertificate,
}

impl fmt::Display for FatalTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FatalTransport::TooManyRedirects => "redirect limit exceeded",
            FatalTransport::UnsupportedScheme => "unsupported URL scheme",
            FatalTransport::UntrustedCertificate => "certificate not trusted",
        })
    }
}

/// The reason attached to a [`Decision`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Terminal {
    /// The request context is done.
    Context(ContextError),
    /// The transport error itself is the terminal error.
    FatalTransport(FatalTransport),
    /// Retryable server status, reported if no attempts remain.
    UnexpectedStatus(u16),
    /// Non-retryable status handed to the caller.
    Status(u16),
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Context(err) => fmt::Display::fmt(err, f),
            Terminal::FatalTransport(kind) => fmt::Display::fmt(kind, f),
            Terminal::UnexpectedStatus(status) => write!(f, "unexpected HTTP status {status}"),
            Terminal::Status(status) => write!(f, "http status {status}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Decision {
    pub retry: bool,
    pub terminal: Option<Terminal>,
}

impl Decision {
    fn success() -> Self {
        Self {
            retry: false,
            terminal: None,
        }
    }

    fn retry() -> Self {
        Self {
            retry: true,
            terminal: None,
        }
    }

    fn stop(terminal: Terminal) -> Self {
        Self {
            retry: false,
            terminal: Some(terminal),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.retry && self.terminal.is_none()
    }
}

/// Classifies one attempt.
///
/// A done context always stops, whatever the outcome was.
pub fn classify(ctx: &RequestContext, outcome: &AttemptOutcome<'_>) -> Decision {
    if let Some(err) = ctx.err() {
        return Decision::stop(Terminal::Context(err));
    }

    match *outcome {
        AttemptOutcome::TransportError(err) => match fatal_transport_kind(err) {
            Some(kind) => Decision::stop(Terminal::FatalTransport(kind)),
            None => Decision::retry(),
        },
        AttemptOutcome::Response { status, .. } => classify_status(status),
    }
}

fn classify_status(status: u16) -> Decision {
    match status {
        // GitHub answers 403 when secondary (concurrency) limits trip.
        429 | 403 => Decision::retry(),
        501 => Decision::stop(Terminal::Status(status)),
        // Catches invalid codes such as 0 and 999 as well.
        0 | 500.. => Decision {
            retry: true,
            terminal: Some(Terminal::UnexpectedStatus(status)),
        },
        200..=299 => Decision::success(),
        _ => Decision::stop(Terminal::Status(status)),
    }
}

/// True when retrying `err` cannot help. See [`fatal_transport_kind`].
pub fn is_fatal_transport_error(err: &(dyn Error + 'static)) -> bool {
    fatal_transport_kind(err).is_some()
}

/// Identifies redirect exhaustion, unsupported schemes and untrusted
/// certificates anywhere in the error's source chain.
pub fn fatal_transport_kind(err: &(dyn Error + 'static)) -> Option<FatalTransport> {
    let mut current = Some(err);
    while let Some(err) = current {
        if err
            .downcast_ref::<reqwest::Error>()
            .is_some_and(reqwest::Error::is_redirect)
        {
            return Some(FatalTransport::TooManyRedirects);
        }
        if let Some(kind) = match_message(&err.to_string()) {
            return Some(kind);
        }
        current = err.source();
    }
    None
}

fn match_message(message: &str) -> Option<FatalTransport> {
    if REDIRECTS_RE.is_match(message) {
        Some(FatalTransport::TooManyRedirects)
    } else if SCHEME_RE.is_match(message) {
        Some(FatalTransport::UnsupportedScheme)
    } else if NOT_TRUSTED_RE.is_match(message) {
        Some(FatalTransport::UntrustedCertificate)
    } else {
        None
    }
}
