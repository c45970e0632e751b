use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::query::Query;
use crate::core::{describe_error_body, read_error_body};

/// Field values of a stored record, as plain JSON.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Errors that can occur while talking to a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    NetworkFailure(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::NetworkFailure(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for StoreError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            // The middleware only fails when no access token could be obtained.
            reqwest_middleware::Error::Middleware(e) => StoreError::PermissionDenied(format!("{:#}", e)),
            reqwest_middleware::Error::Reqwest(e) => e.into(),
        }
    }
}

/// Maps a non-success response to a [`StoreError`].
pub(crate) async fn error_from_response(response: Response, context: &str) -> StoreError {
    let status = response.status();
    let body = read_error_body(response).await;
    let message = format!("{} failed: {}", context, describe_error_body(status, &body));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// A stored record with its identifier, before decoding into a typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub fields: Fields,
    pub update_time: Option<String>,
}

impl RawRecord {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.fields.clone(),
        ))?)
    }
}

/// Collection-oriented persistence addressed by collection name and id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates or replaces the document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawRecord>, StoreError>;

    /// Deleting a document that does not exist succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Deletes all ids in a single atomic commit.
    async fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<(), StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<RawRecord>, StoreError>;

    async fn run_query(&self, query: &Query) -> Result<Vec<RawRecord>, StoreError>;
}
