use std::fmt;
use std::str::FromStr;

use url::Url;

use super::StorageError;

const FIREBASE_DOWNLOAD_HOST: &str = "firebasestorage.googleapis.com";
const STORAGE_HOST: &str = "storage.googleapis.com";

/// Address of one object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    bucket: String,
    name: String,
}

impl ObjectLocator {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Result<Self, StorageError> {
        let bucket = bucket.into();
        let name = name.into();
        if bucket.is_empty() || name.is_empty() {
            return Err(StorageError::InvalidLocator(format!("{}/{}", bucket, name)));
        }
        Ok(Self { bucket, name })
    }

    /// Parses an externally issued locator.
    ///
    /// Accepts `gs://<bucket>/<object>`, Firebase download URLs
    /// (`https://firebasestorage.googleapis.com/v0/b/<bucket>/o/<encoded object>?...`)
    /// and public object URLs (`https://storage.googleapis.com/<bucket>/<object>`).
    pub fn parse(locator: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::InvalidLocator(locator.to_string());

        if let Some(rest) = locator.strip_prefix("gs://") {
            let (bucket, name) = rest.split_once('/').ok_or_else(invalid)?;
            return Self::new(bucket, name).map_err(|_| invalid());
        }

        let url = Url::parse(locator).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let segments: Vec<&str> = url.path_segments().ok_or_else(invalid)?.collect();

        let (bucket, name) = match (url.host_str(), segments.as_slice()) {
            (Some(FIREBASE_DOWNLOAD_HOST), ["v0", "b", bucket, "o", name]) => {
                (decode(bucket).ok_or_else(invalid)?, decode(name).ok_or_else(invalid)?)
            }
            (Some(STORAGE_HOST), [bucket, rest @ ..]) if !rest.is_empty() => {
                let name = rest
                    .iter()
                    .map(|s| decode(s))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(invalid)?
                    .join("/");
                (decode(bucket).ok_or_else(invalid)?, name)
            }
            _ => return Err(invalid()),
        };

        Self::new(bucket, name).map_err(|_| invalid())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn decode(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}

impl FromStr for ObjectLocator {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}
