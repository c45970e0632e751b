use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_MESSAGING_URL: &str = "https://fcm.googleapis.com";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com/storage/v1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {name} is not valid unicode")]
    NotUnicode { name: &'static str },
}

/// Base URLs of the remote services. Override them to target an emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub messaging: String,
    pub firestore: String,
    pub storage: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            messaging: DEFAULT_MESSAGING_URL.to_string(),
            firestore: DEFAULT_FIRESTORE_URL.to_string(),
            storage: DEFAULT_STORAGE_URL.to_string(),
        }
    }
}

/// Configuration built once by the caller and passed to [`crate::FirebaseApp::new`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the service-account JSON file.
    pub credential_path: PathBuf,
    /// Overrides the `project_id` found in the credential file.
    pub project_id: Option<String>,
    pub endpoints: Endpoints,
}

impl AppConfig {
    pub fn new(credential_path: impl Into<PathBuf>) -> Self {
        Self {
            credential_path: credential_path.into(),
            project_id: None,
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// `GOOGLE_APPLICATION_CREDENTIALS` is required. `FIREBASE_PROJECT_ID`,
    /// `FIREBASE_MESSAGING_URL`, `FIREBASE_FIRESTORE_URL` and
    /// `FIREBASE_STORAGE_URL` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Result<String, env::VarError>,
    {
        let read = |name: &'static str| -> Result<Option<String>, ConfigError> {
            match lookup(name) {
                Ok(value) if value.trim().is_empty() => Ok(None),
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { name }),
            }
        };

        let credential_path = read("GOOGLE_APPLICATION_CREDENTIALS")?
            .ok_or(ConfigError::Missing("GOOGLE_APPLICATION_CREDENTIALS"))?;

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            messaging: read("FIREBASE_MESSAGING_URL")?.unwrap_or(defaults.messaging),
            firestore: read("FIREBASE_FIRESTORE_URL")?.unwrap_or(defaults.firestore),
            storage: read("FIREBASE_STORAGE_URL")?.unwrap_or(defaults.storage),
        };

        Ok(Self {
            credential_path: PathBuf::from(credential_path),
            project_id: read("FIREBASE_PROJECT_ID")?,
            endpoints,
        })
    }
}
