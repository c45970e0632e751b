//! Push notifications over the FCM HTTP v1 API.
//!
//! [`PushDispatcher`] performs the single authorized `messages:send` call.
//! [`PushService`] runs the whole pipeline for one message:
//!
//! ```text
//! Idle -> CredentialLoaded -> AssertionSigned -> TokenAcquired -> MessageSent
//! ```
//!
//! The first failing stage aborts the rest and is reported as a [`PushError`].

pub mod models;
#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::auth::assertion::SigningError;
use crate::auth::credential::CredentialError;
use crate::auth::source::{ServiceAccountTokenSource, TokenSourceError};
use crate::auth::token::{AccessToken, TokenError};
use crate::core::read_error_body;
use self::models::{SendRequest, SendResponse};
pub use self::models::{PushMessage, SendReceipt};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("push request failed: {0}")]
    NetworkFailure(#[from] reqwest::Error),
    #[error("push gateway rejected the message with status {status}: {body}")]
    GatewayRejected { status: u16, body: String },
    #[error("failed to encode push message: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The stage a push pipeline run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStage {
    Idle,
    CredentialLoaded,
    AssertionSigned,
    TokenAcquired,
    MessageSent,
}

impl fmt::Display for PushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PushStage::Idle => "idle",
            PushStage::CredentialLoaded => "credential-loaded",
            PushStage::AssertionSigned => "assertion-signed",
            PushStage::TokenAcquired => "token-acquired",
            PushStage::MessageSent => "message-sent",
        };
        f.write_str(name)
    }
}

/// Terminal failure of the push pipeline.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("loading credential: {0}")]
    Credential(#[from] CredentialError),
    #[error("signing assertion: {0}")]
    Signing(#[from] SigningError),
    #[error("exchanging assertion: {0}")]
    Token(#[from] TokenError),
    #[error("dispatching message: {0}")]
    Dispatch(#[from] DispatchError),
}

impl PushError {
    /// The last stage that completed before the failure.
    pub fn stage(&self) -> PushStage {
        match self {
            PushError::Credential(_) => PushStage::Idle,
            PushError::Signing(_) => PushStage::CredentialLoaded,
            PushError::Token(_) => PushStage::AssertionSigned,
            PushError::Dispatch(_) => PushStage::TokenAcquired,
        }
    }
}

impl From<TokenSourceError> for PushError {
    fn from(err: TokenSourceError) -> Self {
        match err {
            TokenSourceError::Credential(e) => PushError::Credential(e),
            TokenSourceError::Signing(e) => PushError::Signing(e),
            TokenSourceError::Token(e) => PushError::Token(e),
        }
    }
}

/// Sends one message per call with a caller-supplied access token.
#[derive(Clone)]
pub struct PushDispatcher {
    client: Client,
    base_url: String,
}

impl PushDispatcher {
    /// `base_url` is the gateway root, e.g. `https://fcm.googleapis.com`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn send_url(&self, project_id: &str) -> String {
        format!("{}/v1/projects/{}/messages:send", self.base_url, project_id)
    }

    pub async fn send(
        &self,
        message: &PushMessage,
        access_token: &AccessToken,
        project_id: &str,
    ) -> Result<SendReceipt, DispatchError> {
        self.send_request(message, access_token, project_id, false)
            .await
    }

    /// Asks the gateway to validate the message without delivering it.
    pub async fn send_dry_run(
        &self,
        message: &PushMessage,
        access_token: &AccessToken,
        project_id: &str,
    ) -> Result<SendReceipt, DispatchError> {
        self.send_request(message, access_token, project_id, true)
            .await
    }

    #[instrument(skip(self, message, access_token))]
    async fn send_request(
        &self,
        message: &PushMessage,
        access_token: &AccessToken,
        project_id: &str,
        dry_run: bool,
    ) -> Result<SendReceipt, DispatchError> {
        let request = SendRequest::new(message, dry_run);

        let response = self
            .client
            .post(self.send_url(project_id))
            .bearer_auth(access_token.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = read_error_body(response).await;
            warn!(%status, "push gateway rejected message");
            return Err(DispatchError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }

        // A 200 is a delivery acknowledgement even if the body is unreadable.
        let message_id = response
            .json::<SendResponse>()
            .await
            .ok()
            .and_then(|r| r.name);

        Ok(SendReceipt { message_id })
    }
}

/// Authenticated push pipeline. Construct one per configuration; it holds no
/// mutable state, so it can be shared across tasks.
#[derive(Clone)]
pub struct PushService {
    tokens: Arc<ServiceAccountTokenSource>,
    dispatcher: PushDispatcher,
    project_id: String,
}

impl PushService {
    pub fn new(
        tokens: Arc<ServiceAccountTokenSource>,
        gateway_url: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            dispatcher: PushDispatcher::new(gateway_url),
            project_id: project_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn send(&self, message: &PushMessage) -> Result<SendReceipt, PushError> {
        self.run(message, false).await
    }

    pub async fn send_dry_run(&self, message: &PushMessage) -> Result<SendReceipt, PushError> {
        self.run(message, true).await
    }

    #[instrument(skip(self, message), fields(project_id = %self.project_id))]
    async fn run(&self, message: &PushMessage, dry_run: bool) -> Result<SendReceipt, PushError> {
        let result = self.run_stages(message, dry_run).await;
        match &result {
            Ok(receipt) => info!(
                stage = %PushStage::MessageSent,
                message_id = ?receipt.message_id,
                "push delivered"
            ),
            Err(e) => warn!(stage = %e.stage(), error = %e, "push pipeline aborted"),
        }
        result
    }

    async fn run_stages(
        &self,
        message: &PushMessage,
        dry_run: bool,
    ) -> Result<SendReceipt, PushError> {
        let credential = self.tokens.load_credential()?;
        let token = self.tokens.token_for(&credential).await?;

        let receipt = if dry_run {
            self.dispatcher
                .send_dry_run(message, &token, &self.project_id)
                .await?
        } else {
            self.dispatcher
                .send(message, &token, &self.project_id)
                .await?
        };

        Ok(receipt)
    }
}
