//! Integration tests for the HTTP fetcher
//!
//! These tests use wiremock to check retries, rate limiting, pacing and
//! form posts against real HTTP round trips.

use faq_harvest::config::BackoffStrategy;
use faq_harvest::crawler::{FetchError, FetchPolicy, Fetcher, Pacer, PageRequest};
use faq_harvest::state::RequestStats;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(max_attempts: u32, min_interval: Duration) -> Fetcher {
    let policy = FetchPolicy {
        max_attempts,
        retry_delay: Duration::from_millis(10),
        backoff: BackoffStrategy::Fixed,
        max_retry_after: Duration::from_secs(5),
    };
    Fetcher::new(reqwest::Client::new(), policy, min_interval)
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher(3, Duration::from_millis(1));
    let mut stats = RequestStats::default();
    let page = fetcher
        .fetch(&PageRequest::get(format!("{}/flaky", server.uri())), &mut stats)
        .await
        .unwrap();

    assert_eq!(page.status, 200);
    assert_eq!(page.body, "<html>ok</html>");
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn test_rate_limit_waits_for_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let fetcher = fetcher(3, Duration::from_millis(1));
    let mut stats = RequestStats::default();
    let started = Instant::now();
    let page = fetcher
        .fetch(&PageRequest::get(format!("{}/busy", server.uri())), &mut stats)
        .await
        .unwrap();

    assert_eq!(page.body, "done");
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(stats.rate_limited, 1);
    assert_eq!(stats.attempts, 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(3, Duration::from_millis(1));
    let mut stats = RequestStats::default();
    let result = fetcher
        .fetch(&PageRequest::get(format!("{}/missing", server.uri())), &mut stats)
        .await;

    match result {
        Err(FetchError::Client { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected a client error, got {:?}", other),
    }
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.failures, 1);
}

#[tokio::test]
async fn test_retries_are_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher(3, Duration::from_millis(1));
    let mut stats = RequestStats::default();
    let err = fetcher
        .fetch(&PageRequest::get(format!("{}/down", server.uri())), &mut stats)
        .await
        .unwrap_err();

    match err {
        FetchError::Exhausted {
            attempts,
            last_error,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_error, "HTTP 503");
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.successes, 0);
}

#[tokio::test]
async fn test_connection_failure_is_exhausted() {
    // Nothing listens on the discard port
    let fetcher = fetcher(2, Duration::from_millis(1));
    let mut stats = RequestStats::default();
    let err = fetcher
        .fetch(&PageRequest::get("http://127.0.0.1:9/faq"), &mut stats)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
    assert_eq!(stats.attempts, 2);
}

#[tokio::test]
async fn test_requests_are_paced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher(1, Duration::from_millis(200));
    let mut stats = RequestStats::default();
    let request = PageRequest::get(format!("{}/page", server.uri()));

    let started = Instant::now();
    for _ in 0..3 {
        fetcher.fetch(&request, &mut stats).await.unwrap();
    }

    // The first request goes out immediately, the next two wait their turn
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(stats.successes, 3);
}

#[tokio::test]
async fn test_fetchers_sharing_a_pacer_are_paced_together() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page"))
        .expect(2)
        .mount(&server)
        .await;

    // Each fetcher alone would not wait at all
    let pacer = Arc::new(Pacer::new(Duration::from_millis(300)));
    let first = fetcher(1, Duration::from_millis(1)).with_pacer(Arc::clone(&pacer));
    let second = fetcher(1, Duration::from_millis(1)).with_pacer(Arc::clone(&pacer));
    let request = PageRequest::get(format!("{}/page", server.uri()));

    let mut stats = RequestStats::default();
    let started = Instant::now();
    first.fetch(&request, &mut stats).await.unwrap();
    second.fetch(&request, &mut stats).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(stats.successes, 2);
}

#[tokio::test]
async fn test_post_sends_form_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("keyword=overtime&page=2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("results"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(1, Duration::from_millis(1));
    let mut stats = RequestStats::default();
    let request = PageRequest::post(
        format!("{}/search", server.uri()),
        vec![
            ("keyword".to_string(), "overtime".to_string()),
            ("page".to_string(), "2".to_string()),
        ],
    );
    let page = fetcher.fetch(&request, &mut stats).await.unwrap();

    assert_eq!(page.body, "results");
}
