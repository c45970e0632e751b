use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("credential file not found: {path}")]
    NotFound { path: String },
    #[error("malformed service account credential: {0}")]
    Malformed(String),
}

/// A Google service-account key file.
///
/// Every field of the key file must be present for the credential to load,
/// although only `client_email`, `private_key` and `token_uri` are used to
/// obtain tokens.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredential {
    #[serde(rename = "type")]
    key_type: String,
    project_id: String,
    private_key_id: String,
    private_key: String,
    client_email: String,
    client_id: String,
    auth_uri: String,
    token_uri: String,
    auth_provider_x509_cert_url: String,
    client_x509_cert_url: String,
}

impl ServiceAccountCredential {
    /// Reads and validates a key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CredentialError::NotFound {
                path: path.display().to_string(),
            },
            _ => CredentialError::Malformed(format!("unable to read {}: {}", path.display(), e)),
        })?;

        Self::from_json(&data)
    }

    /// Parses and validates an in-memory key file.
    pub fn from_json(data: &str) -> Result<Self, CredentialError> {
        let credential: Self =
            serde_json::from_str(data).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        credential.validate()?;
        Ok(credential)
    }

    fn validate(&self) -> Result<(), CredentialError> {
        let required = [
            ("client_email", &self.client_email),
            ("private_key", &self.private_key),
            ("token_uri", &self.token_uri),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(CredentialError::Malformed(format!("{} is empty", name)));
            }
        }

        Ok(())
    }

    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn private_key_id(&self) -> &str {
        &self.private_key_id
    }

    /// The issuer of every assertion signed with this credential.
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn auth_uri(&self) -> &str {
        &self.auth_uri
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    pub fn auth_provider_x509_cert_url(&self) -> &str {
        &self.auth_provider_x509_cert_url
    }

    pub fn client_x509_cert_url(&self) -> &str {
        &self.client_x509_cert_url
    }

    /// Stable identity of the credential, safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.client_email.as_bytes());
        hasher.update(b":");
        hasher.update(self.private_key_id.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

// Keeps the private key out of logs and panic messages.
impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
