use super::*;
use crate::auth::source::{CredentialSource, ServiceAccountTokenSource};
use crate::test_support::credential;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

// The object name is a single percent-encoded path segment.
const AVATAR_PATH: &str = r"^/storage/v1/b/demo\.appspot\.com/o/avatars(%2F|/)user(%20| )42\.png$";

fn storage_for(server: &MockServer) -> FirebaseStorage {
    let client = ClientBuilder::new(Client::new()).build();
    FirebaseStorage::new_with_client(client, server.url("/storage/v1"))
}

fn avatar() -> ObjectLocator {
    ObjectLocator::new("demo.appspot.com", "avatars/user 42.png").unwrap()
}

#[tokio::test]
async fn test_delete_object() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path_matches(AVATAR_PATH);
            then.status(204);
        })
        .await;

    storage_for(&server).delete(&avatar()).await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_by_download_url() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path_matches(r"^/storage/v1/b/demo\.appspot\.com/o/avatars(%2F|/)42\.png$");
            then.status(204);
        })
        .await;

    storage_for(&server)
        .delete_by_locator(
            "https://firebasestorage.googleapis.com/v0/b/demo.appspot.com/o/avatars%2F42.png?alt=media&token=abc",
        )
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_delete_invalid_locator_sends_nothing() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(DELETE);
            then.status(204);
        })
        .await;

    let err = storage_for(&server)
        .delete_by_locator("https://example.com/not-a-bucket")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::InvalidLocator(_)));
    mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_delete_missing_object() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE);
            then.status(404).json_body(json!({
                "error": { "code": 404, "message": "No such object: demo.appspot.com/avatars/user 42.png" }
            }));
        })
        .await;

    let err = storage_for(&server).delete(&avatar()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(ref m) if m.contains("No such object")));
}

#[tokio::test]
async fn test_delete_forbidden() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE);
            then.status(403).body("caller does not have storage.objects.delete access");
        })
        .await;

    let err = storage_for(&server).delete(&avatar()).await.unwrap_err();
    assert!(matches!(err, StorageError::PermissionDenied(_)));
}

#[tokio::test]
async fn test_delete_server_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE);
            then.status(503);
        })
        .await;

    let err = storage_for(&server).delete(&avatar()).await.unwrap_err();
    assert!(matches!(err, StorageError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_delete_authorized_by_middleware() {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({ "access_token": "abc123" }));
        })
        .await;
    let delete_mock = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path_matches(AVATAR_PATH)
                .header("authorization", "Bearer abc123");
            then.status(204);
        })
        .await;

    let tokens = Arc::new(ServiceAccountTokenSource::new(CredentialSource::Key(
        Arc::new(credential(&server.url("/token"))),
    )));
    let storage = FirebaseStorage::new(AuthMiddleware::new(tokens), server.url("/storage/v1"));
    storage.delete(&avatar()).await.unwrap();

    token_mock.assert_async().await;
    delete_mock.assert_async().await;
}

#[tokio::test]
async fn test_token_failure_is_permission_denied() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/token");
            then.status(400).json_body(json!({ "error": "invalid_grant" }));
        })
        .await;

    let tokens = Arc::new(ServiceAccountTokenSource::new(CredentialSource::Key(
        Arc::new(credential(&server.url("/token"))),
    )));
    let storage = FirebaseStorage::new(AuthMiddleware::new(tokens), server.url("/storage/v1"));
    let err = storage.delete(&avatar()).await.unwrap_err();

    assert!(matches!(err, StorageError::PermissionDenied(ref m) if m.contains("invalid_grant")));
}
