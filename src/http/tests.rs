use super::*;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client() -> HttpClient {
    HttpClient::new(Duration::from_secs(5)).with_backoff(Duration::ZERO)
}

async fn post(client: HttpClient, url: String) -> Result<String, PressError> {
    tokio::task::spawn_blocking(move || {
        client.post_json(
            &url,
            &[("x-api-key", "secret")],
            r#"{"ping":true}"#,
            PressError::Embedding,
        )
    })
    .await
    .expect("blocking task should join")
}

#[test]
fn builder_methods() {
    let client = HttpClient::new(Duration::from_secs(1))
        .with_timeout(Duration::from_secs(2))
        .with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);

    let client = client.with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);
}

#[tokio::test]
async fn sends_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("x-api-key", "secret"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"ping":true}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let body = post(test_client(), format!("{}/echo", server.uri()))
        .await
        .expect("should succeed");
    assert_eq!(body, "pong");
}

#[tokio::test]
async fn server_errors_are_retried_then_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = post(test_client(), format!("{}/flaky", server.uri()))
        .await
        .expect_err("should exhaust retries");
    assert!(matches!(err, PressError::Network(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let body = post(test_client(), format!("{}/retry", server.uri()))
        .await
        .expect("second attempt should succeed");
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn auth_and_quota_are_distinct_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(path("/auth"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/quota"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let auth = post(test_client(), format!("{}/auth", server.uri())).await;
    assert!(matches!(auth, Err(PressError::Authentication(_))));

    let forbidden = post(test_client(), format!("{}/forbidden", server.uri())).await;
    assert!(matches!(forbidden, Err(PressError::Authentication(_))));

    let quota = post(test_client(), format!("{}/quota", server.uri())).await;
    assert!(matches!(quota, Err(PressError::Quota(_))));
}

#[tokio::test]
async fn other_client_errors_use_provider_kind() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let err = post(test_client(), format!("{}/bad", server.uri()))
        .await
        .expect_err("400 should fail");
    assert!(matches!(err, PressError::Embedding(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    // Nothing listens on port 9 of the loopback interface
    let client = test_client().with_retry_attempts(2);
    let err = post(client, "http://127.0.0.1:9/embeddings".to_string())
        .await
        .expect_err("connection should fail");
    assert!(matches!(err, PressError::Network(_)));
}

#[tokio::test]
async fn streaming_body_is_read_line_by_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string("first\nsecond\n"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/stream", server.uri());
    let lines = tokio::task::spawn_blocking(move || {
        let reader = test_client().post_json_streaming(&url, &[], "{}", PressError::Generation)?;
        reader
            .lines()
            .collect::<std::io::Result<Vec<String>>>()
            .map_err(PressError::from)
    })
    .await
    .expect("blocking task should join")
    .expect("should stream");

    assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
}

#[tokio::test]
async fn streaming_request_keeps_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/stream", server.uri());
    let result = tokio::task::spawn_blocking(move || {
        test_client()
            .post_json_streaming(&url, &[], "{}", PressError::Generation)
            .map(|_| ())
    })
    .await
    .expect("blocking task should join");

    assert!(matches!(result, Err(PressError::Authentication(_))));
}
