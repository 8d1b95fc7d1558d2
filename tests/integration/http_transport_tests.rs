//! Real HTTP requests routed through a mock server posing as the proxy
//!
//! Plain-HTTP targets are sent to the proxy in absolute form, so the mock
//! server sees the target path and the proxy credentials.

use ripple_harvest::crawler::{
    FailureReason, FetchOutcome, FetchRequest, FetchSettings, Fetcher, HttpTransport,
    IdentityPool, ProxyChecker, ProxyPool, Scheduler, Transport,
};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `host:port` of the mock server
fn proxy_address(server: &MockServer) -> String {
    let address = server.address();
    format!("{}:{}", address.ip(), address.port())
}

fn request(url: &str, timeout: Duration) -> FetchRequest {
    FetchRequest {
        url: url.to_string(),
        timeout,
        identity: "ripple-test-agent".to_string(),
    }
}

#[tokio::test]
async fn test_request_goes_through_proxy_with_identity() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews/bank/"))
        .and(header("user-agent", "ripple-test-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>bank</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let pool = ProxyPool::from_lines(&proxy_address(&server), "test").unwrap();
    let transport = HttpTransport::new(&pool).unwrap();

    let response = transport
        .send(
            &request("http://site.test/reviews/bank/", Duration::from_secs(5)),
            &pool.next(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "<html>bank</html>");
}

#[tokio::test]
async fn test_proxy_credentials_are_sent() {
    let server = MockServer::start().await;

    // base64("user:secret")
    Mock::given(method("GET"))
        .and(path("/private"))
        .and(header("proxy-authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let line = format!("{}:user:secret", proxy_address(&server));
    let pool = ProxyPool::from_lines(&line, "test").unwrap();
    let transport = HttpTransport::new(&pool).unwrap();

    let response = transport
        .send(
            &request("http://site.test/private", Duration::from_secs(5)),
            &pool.next(),
        )
        .await
        .unwrap();

    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_non_ok_status_is_reported_with_empty_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("blocked"))
        .mount(&server)
        .await;

    let pool = ProxyPool::from_lines(&proxy_address(&server), "test").unwrap();
    let transport = HttpTransport::new(&pool).unwrap();

    let response = transport
        .send(
            &request("http://site.test/reviews/", Duration::from_secs(5)),
            &pool.next(),
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 403);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let pool = ProxyPool::from_lines(&proxy_address(&server), "test").unwrap();
    let transport = HttpTransport::new(&pool).unwrap();

    let result = transport
        .send(
            &request("http://site.test/slow", Duration::from_millis(200)),
            &pool.next(),
        )
        .await;

    assert_eq!(result.unwrap_err(), FailureReason::Timeout);
}

#[tokio::test]
async fn test_fetcher_fails_over_from_dead_proxy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews/bank/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("through the live proxy"))
        .expect(1)
        .mount(&server)
        .await;

    // Reserve a port, then release it so nothing listens there
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let lines = format!("127.0.0.1:{}\n{}\n", dead_port, proxy_address(&server));
    let pool = Arc::new(ProxyPool::from_lines(&lines, "test").unwrap());
    let transport = Arc::new(HttpTransport::new(&pool).unwrap());
    let fetcher = Fetcher::new(
        pool,
        transport,
        IdentityPool::default(),
        FetchSettings {
            max_retries: 3,
            timeout: Duration::from_secs(5),
            max_concurrent_requests: 2,
        },
    );

    let outcome = fetcher.get("http://site.test/reviews/bank/").await;

    match outcome {
        FetchOutcome::Success { body, status_code } => {
            assert_eq!(status_code, 200);
            assert_eq!(body, "through the live proxy");
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetcher_gives_up_on_persistent_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let pool = Arc::new(ProxyPool::from_lines(&proxy_address(&server), "test").unwrap());
    let transport = Arc::new(HttpTransport::new(&pool).unwrap());
    let fetcher = Fetcher::new(
        pool,
        transport,
        IdentityPool::default(),
        FetchSettings {
            max_retries: 4,
            timeout: Duration::from_secs(5),
            max_concurrent_requests: 1,
        },
    );

    match fetcher.get("http://site.test/down").await {
        FetchOutcome::Failure { reason, attempts } => {
            assert_eq!(reason, FailureReason::NonOkStatus(500));
            assert_eq!(attempts, 4);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_proxy_check_reports_live_and_dead_proxies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"origin": "10.0.0.1"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let lines = format!("127.0.0.1:{}\n{}\n", dead_port, proxy_address(&server));
    let pool = ProxyPool::from_lines(&lines, "test").unwrap();
    let checker = ProxyChecker::new(
        Arc::new(HttpTransport::new(&pool).unwrap()),
        IdentityPool::default(),
        "http://check.test/ip",
        Duration::from_secs(5),
        Scheduler::concurrent(2),
    );

    let checks = checker.check(&pool).await;

    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0].endpoint.port, dead_port);
    assert!(!checks[0].is_working());
    assert!(matches!(checks[0].outcome, Err(FailureReason::Connection(_))));
    assert!(checks[1].is_working());
    assert_eq!(checks[1].outcome, Ok(200));
}
