use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use super::assertion::{self, SigningError};
use super::credential::{CredentialError, ServiceAccountCredential};
use super::token::{AccessToken, TokenError, TokenExchangeClient};
use crate::core::{Clock, SystemClock};

/// Where the service-account key comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Re-read from disk on every token request.
    File(PathBuf),
    /// Already parsed by the caller.
    Key(Arc<ServiceAccountCredential>),
}

impl CredentialSource {
    pub fn load(&self) -> Result<ServiceAccountCredential, CredentialError> {
        match self {
            CredentialSource::File(path) => ServiceAccountCredential::load(path),
            CredentialSource::Key(key) => Ok(key.as_ref().clone()),
        }
    }
}

/// Failure of one of the three token stages.
#[derive(Error, Debug)]
pub enum TokenSourceError {
    #[error("credential stage failed: {0}")]
    Credential(#[from] CredentialError),
    #[error("signing stage failed: {0}")]
    Signing(#[from] SigningError),
    #[error("token stage failed: {0}")]
    Token(#[from] TokenError),
}

/// Runs credential → assertion → token exchange for every request.
///
/// Nothing is cached: each call loads the credential, signs a new assertion
/// and performs one token request.
pub struct ServiceAccountTokenSource {
    credentials: CredentialSource,
    exchange: TokenExchangeClient,
    clock: Arc<dyn Clock>,
}

impl ServiceAccountTokenSource {
    pub fn new(credentials: CredentialSource) -> Self {
        Self {
            credentials,
            exchange: TokenExchangeClient::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_exchange_client(mut self, exchange: TokenExchangeClient) -> Self {
        self.exchange = exchange;
        self
    }

    pub fn load_credential(&self) -> Result<ServiceAccountCredential, CredentialError> {
        self.credentials.load()
    }

    /// Signs and exchanges an assertion for an already loaded credential.
    #[instrument(skip_all, fields(credential = %credential.fingerprint()))]
    pub async fn token_for(
        &self,
        credential: &ServiceAccountCredential,
    ) -> Result<AccessToken, TokenSourceError> {
        let assertion = assertion::sign(credential, self.clock.now())?;
        debug!(expires_at = %assertion.expires_at(), "assertion signed");

        let token = self
            .exchange
            .exchange(&assertion, credential.token_uri())
            .await?;
        Ok(token)
    }

    pub async fn access_token(&self) -> Result<AccessToken, TokenSourceError> {
        let credential = self.load_credential()?;
        self.token_for(&credential).await
    }
}
