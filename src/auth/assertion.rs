use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use super::credential::ServiceAccountCredential;

/// Scope requested for every token. It covers FCM v1, Firestore and Storage.
pub const PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Lifetime of an assertion. Google rejects anything longer.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("failed to sign assertion: {0}")]
    SignatureFailure(String),
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// A signed JWT bearer assertion, valid for one hour from `issued_at`.
#[derive(Clone)]
pub struct SignedAssertion {
    issuer: String,
    scope: String,
    audience: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    signature: Vec<u8>,
    encoded: String,
}

impl SignedAssertion {
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The compact `header.claims.signature` form sent to the token endpoint.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.issued_at && instant < self.expires_at
    }
}

impl std::fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Signs the OAuth2 JWT bearer assertion for `credential` at `now`.
///
/// The token lifetime is fixed at [`ASSERTION_LIFETIME_SECS`]; the audience
/// is the credential's `token_uri`.
pub fn sign(
    credential: &ServiceAccountCredential,
    now: DateTime<Utc>,
) -> Result<SignedAssertion, SigningError> {
    let key = decode_private_key(credential.private_key())?;

    let issued_at = now;
    let expires_at = now + Duration::seconds(ASSERTION_LIFETIME_SECS);

    let claims = AssertionClaims {
        iss: credential.client_email(),
        scope: PLATFORM_SCOPE,
        aud: credential.token_uri(),
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    let header = Header::new(Algorithm::RS256);
    let header_json =
        serde_json::to_vec(&header).map_err(|e| SigningError::SignatureFailure(e.to_string()))?;
    let claims_json =
        serde_json::to_vec(&claims).map_err(|e| SigningError::SignatureFailure(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let signer = SigningKey::<Sha256>::new(key);
    let signature = signer
        .try_sign(signing_input.as_bytes())
        .map_err(|e| SigningError::SignatureFailure(e.to_string()))?
        .to_vec();

    let encoded = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&signature));

    Ok(SignedAssertion {
        issuer: credential.client_email().to_string(),
        scope: PLATFORM_SCOPE.to_string(),
        audience: credential.token_uri().to_string(),
        issued_at,
        expires_at,
        signature,
        encoded,
    })
}

/// Strips the PEM armor and line breaks, then parses the PKCS#8 DER body.
fn decode_private_key(pem: &str) -> Result<RsaPrivateKey, SigningError> {
    let body: String = pem
        .replace("\\n", "\n")
        .lines()
        .filter(|line| !line.trim_start().starts_with("-----"))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect();

    if body.is_empty() {
        return Err(SigningError::InvalidKey("no key material".to_string()));
    }

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| SigningError::InvalidKey(format!("base64: {}", e)))?;

    RsaPrivateKey::from_pkcs8_der(&der).map_err(|e| SigningError::InvalidKey(e.to_string()))
}
