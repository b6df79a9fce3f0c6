//! Transport retry-and-backoff behavior against a mock HTTP server.
//! SPEC_FULL §8 scenario S7.

use reqwest::Method;
use reviewer_core::auth::AuthManager;
use reviewer_core::transport::Transport;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn transport_against(server: &MockServer) -> Transport {
    let http = reqwest::Client::new();
    let auth = AuthManager::new_pat("a".repeat(40), server.uri(), http.clone()).unwrap();
    Transport::new(http, Arc::new(auth), server.uri())
}

#[tokio::test]
async fn given_server_errors_then_success_when_requesting_then_retries_until_200() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let transport = transport_against(&server).await;
    let cancel = CancellationToken::new();
    let response = transport
        .request(Method::GET, "/flaky", None, None, &cancel)
        .await
        .expect("eventual success after retries");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn given_not_found_response_when_requesting_then_returns_immediately_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_against(&server).await;
    let cancel = CancellationToken::new();
    let err = transport
        .request(Method::GET, "/missing", None, None, &cancel)
        .await
        .expect_err("404 is authoritative, not retriable");

    match err {
        reviewer_core::errors::ForgeError::Authoritative { status, .. } => assert_eq!(status, 404),
        other => panic!("expected Authoritative(404), got {other:?}"),
    }
}

#[tokio::test]
async fn given_cancelled_token_when_requesting_then_aborts_with_cancellation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let transport = transport_against(&server).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = transport
        .request(Method::GET, "/slow", None, None, &cancel)
        .await
        .expect_err("pre-cancelled token aborts immediately");

    assert!(matches!(err, reviewer_core::errors::ForgeError::Cancelled));
}
