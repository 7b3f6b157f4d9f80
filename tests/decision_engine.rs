//! Drives `classify` and `backoff` with a hand-rolled loop over scripted
//! outcomes, the way an external retry host would.

use std::{error::Error, fmt, time::Duration};

use github_retry_http::{
    backoff, classify, AttemptOutcome, Decision, FatalTransport, RequestContext, RetryConfig,
    Terminal,
};
use reqwest::header::HeaderMap;

#[derive(Debug)]
struct TransportFailure(&'static str);

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Error for TransportFailure {}

enum Scripted {
    Status(u16),
    Failure(TransportFailure),
}

#[derive(Debug, PartialEq)]
enum Finished {
    Success(u16),
    Stopped(Terminal),
    GaveUp { attempts: u32 },
}

struct Run {
    finished: Finished,
    attempts: u32,
    sleeps: Vec<Duration>,
}

fn drive(ctx: &RequestContext, config: &RetryConfig, script: Vec<Scripted>) -> Run {
    let headers = HeaderMap::new();
    let mut sleeps = Vec::new();
    let mut attempts = 0;
    for step in &script {
        attempts += 1;
        let outcome = match step {
            Scripted::Status(status) => AttemptOutcome::Response {
                status: *status,
                headers: &headers,
            },
            Scripted::Failure(err) => AttemptOutcome::TransportError(err),
        };
        let decision: Decision = classify(ctx, &outcome);
        if !decision.retry {
            let finished = match (decision.terminal, outcome.status()) {
                (None, Some(status)) => Finished::Success(status),
                (Some(terminal), _) => Finished::Stopped(terminal),
                (None, None) => unreachable!("transport errors never succeed"),
            };
            return Run {
                finished,
                attempts,
                sleeps,
            };
        }
        if attempts >= config.max_attempts {
            return Run {
                finished: Finished::GaveUp { attempts },
                attempts,
                sleeps,
            };
        }
        sleeps.push(backoff(config, attempts - 1, &outcome));
    }
    panic!("script ran out after {attempts} attempts");
}

fn config(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        min_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(8),
    }
}

#[test]
fn three_rate_limits_then_success_sleeps_three_times() {
    let run = drive(
        &RequestContext::background(),
        &config(4),
        vec![
            Scripted::Status(429),
            Scripted::Status(429),
            Scripted::Status(429),
            Scripted::Status(200),
        ],
    );
    assert_eq!(run.finished, Finished::Success(200));
    assert_eq!(run.attempts, 4);
    assert_eq!(
        run.sleeps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
}

#[test]
fn four_forbidden_responses_give_up() {
    let run = drive(
        &RequestContext::background(),
        &config(4),
        vec![
            Scripted::Status(403),
            Scripted::Status(403),
            Scripted::Status(403),
            Scripted::Status(403),
        ],
    );
    assert_eq!(run.finished, Finished::GaveUp { attempts: 4 });
    assert_eq!(run.sleeps.len(), 3);
}

#[test]
fn untrusted_certificate_is_not_retried() {
    let run = drive(
        &RequestContext::background(),
        &config(4),
        vec![
            Scripted::Failure(TransportFailure(
                "x509: certificate signed by unknown authority",
            )),
            Scripted::Status(200),
        ],
    );
    assert_eq!(
        run.finished,
        Finished::Stopped(Terminal::FatalTransport(
            FatalTransport::UntrustedCertificate
        ))
    );
    assert_eq!(run.attempts, 1);
    assert!(run.sleeps.is_empty());
}

#[test]
fn transient_transport_errors_back_off_exponentially() {
    let run = drive(
        &RequestContext::background(),
        &config(5),
        vec![
            Scripted::Failure(TransportFailure("connection refused")),
            Scripted::Failure(TransportFailure("connection reset by peer")),
            Scripted::Status(500),
            Scripted::Failure(TransportFailure("operation timed out")),
            Scripted::Status(201),
        ],
    );
    assert_eq!(run.finished, Finished::Success(201));
    assert_eq!(
        run.sleeps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );
}

#[test]
fn not_implemented_stops_with_its_status() {
    let run = drive(
        &RequestContext::background(),
        &config(4),
        vec![Scripted::Status(501)],
    );
    assert_eq!(run.finished, Finished::Stopped(Terminal::Status(501)));
}
