use std::time::Duration;

use github_retry_http::{
    ClientOptions, RequestContext, RetryConfig, RetryingClient, RATELIMIT_REMAINING,
};

fn live_enabled() -> bool {
    std::env::var("GH_RETRY_LIVE").is_ok_and(|value| value == "1")
}

#[tokio::test]
async fn live_rate_limit_endpoint_reports_quota() {
    if !live_enabled() {
        eprintln!("skipping live test: set GH_RETRY_LIVE=1 to call api.github.com");
        return;
    }

    let client = RetryingClient::with_options(ClientOptions {
        retry: RetryConfig {
            max_attempts: 2,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
        },
        ..ClientOptions::default()
    })
    .expect("client must build");
    let ctx = RequestContext::background().with_timeout(Duration::from_secs(30));

    let response = client
        .get(&ctx, "https://api.github.com/rate_limit")
        .await
        .expect("rate_limit endpoint must answer");

    assert!(response.status().is_success());
    let remaining = response
        .headers()
        .get(&RATELIMIT_REMAINING)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    assert!(remaining.is_some(), "missing x-ratelimit-remaining header");
}
