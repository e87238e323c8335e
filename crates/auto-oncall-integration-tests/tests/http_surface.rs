//! HTTP-level behavior of the webhook service.

mod common;

use common::{push_payload, TestService};
use serde_json::Value;

#[tokio::test]
async fn test_root_identifies_webhook_handler() {
    let service = TestService::start().await;

    let response = service.get("/").await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "webhook handler");
}

#[tokio::test]
async fn test_health_and_metrics_are_served() {
    let service = TestService::start().await;

    assert_eq!(service.get("/health").await.status(), 200);

    let metrics = service.get("/metrics").await.text().await.unwrap();
    assert!(metrics.contains("webhook_requests_total"));
}

#[tokio::test]
async fn test_wrong_signature_is_rejected_without_processing() {
    let service = TestService::start().await;
    let body = serde_json::to_vec(&push_payload(
        "refs/heads/master",
        "foo",
        "alice",
        "abcdef1234567890",
    ))
    .unwrap();

    let response = service
        .deliver_raw(
            "push",
            "sha1=01dc10d0c83e72ed246219cdd91669667fe2ca59",
            body,
        )
        .await;

    assert_eq!(response.status(), 400);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error, serde_json::json!({ "error": "invalid request" }));

    assert_eq!(service.settle().await.completed, 0);
    assert!(service.opsgenie_requests().await.is_empty());
}

#[tokio::test]
async fn test_truncated_signature_is_rejected() {
    let service = TestService::start().await;

    let response = service
        .deliver_raw("push", "sha1=01dc10d0", b"{}".to_vec())
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_signature_with_wrong_prefix_is_rejected() {
    let service = TestService::start().await;

    let response = service
        .deliver_raw(
            "push",
            "sha2=01dc10d0c83e72ed246219cdd91669667fe2ca59",
            b"{}".to_vec(),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_get_on_webhook_path_is_rejected() {
    let service = TestService::start().await;

    let response = service.get("/webhook").await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_custom_webhook_path() {
    let service = TestService::start_with(|config| {
        config.webhook.path = "/hooks/github".to_string();
    })
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/hooks/github", service.base_url))
        .body("{}")
        .send()
        .await
        .unwrap();

    // Reached the handler: rejected for missing headers, not 404
    assert_eq!(response.status(), 400);
    assert_eq!(service.get("/unknown").await.status(), 404);
}

#[tokio::test]
async fn test_response_does_not_wait_for_remote_calls() {
    use std::time::{Duration, Instant};
    use wiremock::matchers::method;
    use wiremock::{Mock, ResponseTemplate};

    let service = TestService::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
        .mount(&service.opsgenie)
        .await;

    let started = Instant::now();
    let response = service
        .deliver(
            "push",
            &push_payload("refs/heads/master", "foo", "alice", "abcdef1234567890"),
        )
        .await;

    assert_eq!(response.status(), 200);
    assert!(started.elapsed() < Duration::from_secs(1));
    service.settle().await;
}
