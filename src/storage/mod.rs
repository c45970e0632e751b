//! Cloud Storage object removal.
//!
//! Objects are addressed by the locator the platform issued for them when they
//! were uploaded, typically a Firebase download URL stored next to a record.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_gateway::FirebaseApp;
//! # use firebase_gateway::storage::ObjectLocator;
//! # async fn run(app: FirebaseApp) -> Result<(), Box<dyn std::error::Error>> {
//! let storage = app.storage();
//! let locator = ObjectLocator::parse(
//!     "https://firebasestorage.googleapis.com/v0/b/demo.appspot.com/o/avatars%2F42.png?alt=media",
//! )?;
//! storage.delete(&locator).await?;
//! # Ok(())
//! # }
//! ```

pub mod locator;

#[cfg(test)]
mod tests;

use reqwest::{Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use crate::core::{describe_error_body, read_error_body};
use crate::core::middleware::AuthMiddleware;

pub use self::locator::ObjectLocator;

/// Errors that can occur during Storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid object locator: {0}")]
    InvalidLocator(String),
    #[error("storage request failed: {0}")]
    NetworkFailure(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("object not found: {0}")]
    NotFound(String),
    /// Any other error status returned by the Cloud Storage API.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::NetworkFailure(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for StorageError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Middleware(e) => {
                StorageError::PermissionDenied(format!("{:#}", e))
            }
            reqwest_middleware::Error::Reqwest(e) => e.into(),
        }
    }
}

/// Client for the Cloud Storage JSON API.
#[derive(Clone)]
pub struct FirebaseStorage {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseStorage {
    /// Creates a new `FirebaseStorage` instance.
    ///
    /// This is typically called via `FirebaseApp::storage()`.
    pub fn new(middleware: AuthMiddleware, base_url: impl Into<String>) -> Self {
        let client = ClientBuilder::new(Client::new()).with(middleware).build();
        Self::new_with_client(client, base_url)
    }

    pub fn new_with_client(client: ClientWithMiddleware, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, locator: &ObjectLocator) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::InvalidLocator(format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidLocator(format!("bad base url: {}", self.base_url)))?
            .extend(["b", locator.bucket(), "o", locator.name()]);
        Ok(url)
    }

    /// Deletes the object. A missing object is reported as
    /// [`StorageError::NotFound`].
    #[instrument(skip(self), fields(object = %locator))]
    pub async fn delete(&self, locator: &ObjectLocator) -> Result<(), StorageError> {
        let url = self.object_url(locator)?;
        let response = self.client.delete(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = read_error_body(response).await;
            let message = format!("Delete failed: {}", describe_error_body(status, &text));
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    StorageError::PermissionDenied(message)
                }
                StatusCode::NOT_FOUND => StorageError::NotFound(message),
                _ => StorageError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        info!("object deleted");
        Ok(())
    }

    /// Parses `locator` and deletes the object it names.
    pub async fn delete_by_locator(&self, locator: &str) -> Result<(), StorageError> {
        self.delete(&ObjectLocator::parse(locator)?).await
    }
}
