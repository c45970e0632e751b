pub mod auth;
pub mod core;
#[cfg(feature = "firestore")]
pub mod firestore;
#[cfg(feature = "messaging")]
pub mod messaging;
#[cfg(feature = "storage")]
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use auth::credential::{CredentialError, ServiceAccountCredential};
use auth::source::{CredentialSource, ServiceAccountTokenSource};
use crate::core::config::AppConfig;
#[cfg(any(feature = "firestore", feature = "storage"))]
use crate::core::middleware::AuthMiddleware;
#[cfg(feature = "firestore")]
use firestore::FirebaseFirestore;
#[cfg(feature = "messaging")]
use messaging::PushService;
#[cfg(feature = "storage")]
use storage::FirebaseStorage;

/// Entry point holding the configuration shared by every service client.
///
/// The credential file is validated once here; every token request still
/// re-reads it, so a rotated key is picked up without rebuilding the app.
pub struct FirebaseApp {
    config: AppConfig,
    project_id: String,
    tokens: Arc<ServiceAccountTokenSource>,
}

impl FirebaseApp {
    pub fn new(config: AppConfig) -> Result<Self, CredentialError> {
        let credential = ServiceAccountCredential::load(&config.credential_path)?;
        let project_id = config
            .project_id
            .clone()
            .unwrap_or_else(|| credential.project_id().to_string());

        tracing::info!(
            project_id = %project_id,
            credential = %credential.fingerprint(),
            "firebase app configured"
        );

        let tokens = Arc::new(ServiceAccountTokenSource::new(CredentialSource::File(
            config.credential_path.clone(),
        )));

        Ok(Self {
            config,
            project_id,
            tokens,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[cfg(feature = "messaging")]
    pub fn messaging(&self) -> PushService {
        PushService::new(
            self.tokens.clone(),
            self.config.endpoints.messaging.clone(),
            self.project_id.clone(),
        )
    }

    #[cfg(feature = "firestore")]
    pub fn firestore(&self) -> FirebaseFirestore {
        FirebaseFirestore::new(
            AuthMiddleware::new(self.tokens.clone()),
            &self.config.endpoints.firestore,
            &self.project_id,
        )
    }

    #[cfg(feature = "storage")]
    pub fn storage(&self) -> FirebaseStorage {
        FirebaseStorage::new(
            AuthMiddleware::new(self.tokens.clone()),
            self.config.endpoints.storage.clone(),
        )
    }
}
