use std::fmt;
use std::time::Duration;

use reqwest::{header, IntoUrl, Method};
use tokio::time::sleep;

use crate::{
    backoff, classify, AttemptOutcome, ClientOptions, RequestContext, Result, RetryConfig,
    RetryError, Terminal,
};

#[derive(Clone)]
/// HTTP client that re-issues requests on transient failures and rate limits.
pub struct RetryingClient {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl RetryingClient {
    /// Creates a client with default timeout, user agent and retry settings.
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::default())
    }

    /// Builds the underlying `reqwest` client from `opts`.
    pub fn with_options(opts: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(opts.timeout_ms))
            .user_agent(opts.user_agent)
            .build()
            .map_err(RetryError::Transport)?;
        Ok(Self::from_reqwest(http, opts.retry))
    }

    /// Wraps an existing transport, e.g. one with custom TLS roots or redirect policy.
    pub fn from_reqwest(http: reqwest::Client, retry: RetryConfig) -> Self {
        Self { http, retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Starts a request on the underlying transport; send it with [`RetryingClient::execute`].
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Sends a `GET` with retries.
    pub async fn get<U: IntoUrl>(&self, ctx: &RequestContext, url: U) -> Result<reqwest::Response> {
        let request = self
            .http
            .get(url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .build()
            .map_err(RetryError::Transport)?;
        self.execute(ctx, request).await
    }

    /// Sends `request`, retrying until it succeeds, fails for good, the
    /// context is done, or the attempt ceiling is reached.
    ///
    /// Any 2xx response is returned as is. Other final statuses become
    /// [`RetryError::Http`].
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        request: reqwest::Request,
    ) -> Result<reqwest::Response> {
        let limit = self.retry.attempt_limit();
        let mut attempt = 0u32;
        loop {
            let attempt_request = request.try_clone().ok_or(RetryError::NotReplayable)?;
            let sent = tokio::select! {
                sent = self.http.execute(attempt_request) => sent,
                err = ctx.done() => return Err(err.into()),
            };
            attempt += 1;

            let outcome = AttemptOutcome::from_reqwest(&sent);
            let decision = classify(ctx, &outcome);

            if !decision.retry {
                return finish(ctx, sent, decision.terminal).await;
            }

            if attempt >= limit {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempts = attempt, "retry attempts exhausted");

                let last = last_error(ctx, sent, decision.terminal).await;
                if last.is_context() {
                    return Err(last);
                }
                return Err(RetryError::GaveUp {
                    attempts: attempt,
                    last: Box::new(last),
                });
            }

            let wait = backoff(&self.retry, attempt - 1, &outcome);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                status = outcome.status(),
                wait_ms = wait.as_millis() as u64,
                "retrying request"
            );

            drop(sent);
            tokio::select! {
                _ = sleep(wait) => {}
                err = ctx.done() => return Err(err.into()),
            }
        }
    }
}

async fn finish(
    ctx: &RequestContext,
    sent: reqwest::Result<reqwest::Response>,
    terminal: Option<Terminal>,
) -> Result<reqwest::Response> {
    match (sent, terminal) {
        (_, Some(Terminal::Context(err))) => Err(err.into()),
        (Err(err), _) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %err, "transport error is not retryable");
            Err(RetryError::Transport(err))
        }
        (Ok(response), None) => Ok(response),
        (Ok(response), Some(_)) => Err(http_error(ctx, response).await),
    }
}

async fn last_error(
    ctx: &RequestContext,
    sent: reqwest::Result<reqwest::Response>,
    terminal: Option<Terminal>,
) -> RetryError {
    match (sent, terminal) {
        (Err(err), _) => RetryError::Transport(err),
        (Ok(_), Some(Terminal::UnexpectedStatus(status))) => RetryError::UnexpectedStatus { status },
        (Ok(response), _) => http_error(ctx, response).await,
    }
}

/// Reads the body of a final non-success response. The body may still be
/// streaming, so the read is raced against the context like the send.
async fn http_error(ctx: &RequestContext, response: reqwest::Response) -> RetryError {
    let status = response.status().as_u16();
    tokio::select! {
        body = response.text() => match body {
            Ok(body) => RetryError::Http { status, body },
            Err(err) => RetryError::Transport(err),
        },
        err = ctx.done() => RetryError::from(err),
    }
}
