use super::*;
use crate::auth::source::CredentialSource;
use crate::test_support::{credential_json, serve_truncated, write_temp_file};
use httpmock::prelude::*;
use serde_json::json;
use std::path::PathBuf;

const SEND_PATH: &str = "/v1/projects/test-project/messages:send";

fn service_for(server: &MockServer) -> (PushService, PathBuf) {
    let path = write_temp_file(&credential_json(&server.url("/token")).to_string());
    let tokens = Arc::new(ServiceAccountTokenSource::new(CredentialSource::File(
        path.clone(),
    )));
    (PushService::new(tokens, server.base_url(), "test-project"), path)
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "access_token": "abc123",
                    "token_type": "Bearer",
                    "expires_in": 3600
                }));
        })
        .await
}

fn order_message() -> PushMessage {
    PushMessage::new("device-token-1", "Order shipped", "Your parcel is on its way")
        .with_data("order_id", "A-1001")
}

#[test]
fn test_envelope_shape() {
    let message = order_message();
    let request = SendRequest::new(&message, false);

    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "message": {
                "token": "device-token-1",
                "notification": {
                    "title": "Order shipped",
                    "body": "Your parcel is on its way"
                },
                "data": { "order_id": "A-1001" }
            }
        })
    );

    let dry_run = SendRequest::new(&message, true);
    assert_eq!(serde_json::to_value(&dry_run).unwrap()["validateOnly"], json!(true));
}

#[tokio::test]
async fn test_send_message() {
    let server = MockServer::start_async().await;
    let token_mock = mock_token(&server).await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .header("authorization", "Bearer abc123")
                .header("content-type", "application/json")
                .json_body(json!({
                    "message": {
                        "token": "device-token-1",
                        "notification": {
                            "title": "Order shipped",
                            "body": "Your parcel is on its way"
                        },
                        "data": { "order_id": "A-1001" }
                    }
                }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "name": "projects/test-project/messages/12345" }));
        })
        .await;

    let (service, path) = service_for(&server);
    let receipt = service.send(&order_message()).await.unwrap();

    assert_eq!(
        receipt.message_id.as_deref(),
        Some("projects/test-project/messages/12345")
    );
    token_mock.assert_async().await;
    send_mock.assert_async().await;
    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn test_dispatcher_gateway_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(404).body(r#"{"error":"not-found"}"#);
        })
        .await;

    let dispatcher = PushDispatcher::new(server.base_url());
    let err = dispatcher
        .send(&order_message(), &AccessToken::new("abc123"), "test-project")
        .await
        .unwrap_err();

    match err {
        DispatchError::GatewayRejected { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, r#"{"error":"not-found"}"#);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatcher_unreadable_body_keeps_status() {
    let base = serve_truncated("404 Not Found").await;
    let err = PushDispatcher::new(base)
        .send(&order_message(), &AccessToken::new("abc123"), "test-project")
        .await
        .unwrap_err();

    match err {
        DispatchError::GatewayRejected { status, body } => {
            assert_eq!(status, 404);
            assert!(body.starts_with("<unreadable body:"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatcher_requires_exactly_200() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(202).body("accepted");
        })
        .await;

    let err = PushDispatcher::new(server.base_url())
        .send(&order_message(), &AccessToken::new("abc123"), "test-project")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::GatewayRejected { status: 202, .. }));
}

#[tokio::test]
async fn test_dispatcher_transport_failure() {
    let err = PushDispatcher::new("http://127.0.0.1:1")
        .send(&order_message(), &AccessToken::new("abc123"), "test-project")
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NetworkFailure(_)));
}

#[tokio::test]
async fn test_pipeline_reports_dispatch_stage() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(404).body(r#"{"error":"not-found"}"#);
        })
        .await;

    let (service, path) = service_for(&server);
    let err = service.send(&order_message()).await.unwrap_err();

    assert_eq!(err.stage(), PushStage::TokenAcquired);
    assert!(matches!(
        err,
        PushError::Dispatch(DispatchError::GatewayRejected { status: 404, .. })
    ));
    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn test_token_failure_aborts_before_send() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(500).body("backend error");
        })
        .await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST).path(SEND_PATH);
            then.status(200).json_body(json!({ "name": "never" }));
        })
        .await;

    let (service, path) = service_for(&server);
    let err = service.send(&order_message()).await.unwrap_err();

    assert_eq!(err.stage(), PushStage::AssertionSigned);
    assert!(matches!(err, PushError::Token(TokenError::NetworkFailure(_))));
    send_mock.assert_calls_async(0).await;
    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn test_missing_credential_aborts_pipeline() {
    let tokens = Arc::new(ServiceAccountTokenSource::new(CredentialSource::File(
        std::env::temp_dir().join("firebase-gateway-no-such-key.json"),
    )));
    let service = PushService::new(tokens, "http://127.0.0.1:1", "test-project");

    let err = service.send(&order_message()).await.unwrap_err();
    assert_eq!(err.stage(), PushStage::Idle);
    assert!(matches!(err, PushError::Credential(CredentialError::NotFound { .. })));
}

#[tokio::test]
async fn test_send_dry_run() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(SEND_PATH)
                .json_body(json!({
                    "validateOnly": true,
                    "message": {
                        "token": "device-token-1",
                        "notification": {
                            "title": "Order shipped",
                            "body": "Your parcel is on its way"
                        },
                        "data": { "order_id": "A-1001" }
                    }
                }));
            then.status(200)
                .json_body(json!({ "name": "projects/test-project/messages/fake" }));
        })
        .await;

    let (service, path) = service_for(&server);
    let receipt = service.send_dry_run(&order_message()).await.unwrap();

    assert_eq!(
        receipt.message_id.as_deref(),
        Some("projects/test-project/messages/fake")
    );
    send_mock.assert_async().await;
    std::fs::remove_file(path).unwrap();
}
