use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::assertion::SignedAssertion;

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    NetworkFailure(String),
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<serde_json::Value>,
}

/// Some endpoints send `expires_in` as a string or a fraction. Anything that
/// is not a non-negative number of seconds is treated as absent.
fn lifetime_secs(value: &serde_json::Value) -> Option<u64> {
    let secs = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (secs.is_finite() && secs >= 0.0).then(|| secs as u64)
}

/// A bearer token issued by the OAuth2 endpoint. Held only for the call that
/// requested it.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    token_type: Option<String>,
    expires_in: Option<Duration>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_type: None,
            expires_in: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Lifetime declared by the server, if any.
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Exchanges signed assertions for access tokens.
#[derive(Clone, Default)]
pub struct TokenExchangeClient {
    client: Client,
}

impl TokenExchangeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Sends exactly one token request to `token_uri`.
    #[instrument(skip(self, assertion), fields(issuer = %assertion.issuer()))]
    pub async fn exchange(
        &self,
        assertion: &SignedAssertion,
        token_uri: &str,
    ) -> Result<AccessToken, TokenError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", assertion.as_str())
            .finish();

        let response = self
            .client
            .post(token_uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| TokenError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TokenError::NetworkFailure(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "token endpoint rejected the assertion");
            return Err(TokenError::NetworkFailure(format!("{}: {}", status, text)));
        }

        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| TokenError::MalformedResponse(e.to_string()))?;

        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TokenError::MalformedResponse("missing access_token".to_string()))?;

        let expires_in = parsed.expires_in.as_ref().and_then(lifetime_secs);
        debug!(?expires_in, "access token acquired");

        Ok(AccessToken {
            token,
            token_type: parsed.token_type,
            expires_in: expires_in.map(Duration::from_secs),
        })
    }
}
