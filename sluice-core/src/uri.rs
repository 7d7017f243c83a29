//! Object-store URIs
//!
//! An `ObjectUri` addresses a key (or key prefix) inside a bucket, written as
//! `s3://bucket/some/key`. Joining segments always produces `/`-separated keys
//! without leading or doubled slashes, which keeps the workspace layout stable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ParameterError;

/// A bucket + key pair parsed from a `scheme://bucket/key` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectUri {
    scheme: String,
    bucket: String,
    key: String,
}

impl ObjectUri {
    /// Creates a URI from its parts
    pub fn new(
        scheme: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let key: String = key.into();
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.trim_matches('/').to_string(),
        }
    }

    /// Parses a URI such as `s3://bucket/prefix`
    ///
    /// The key is stored decoded, so `s3://bucket/my logs` and
    /// `s3://bucket/my%20logs` name the same object.
    pub fn parse(raw: &str) -> Result<Self, ParameterError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ParameterError::InvalidUri(format!("{raw}: {e}")))?;

        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ParameterError::InvalidUri(format!("{raw}: missing bucket")))?;

        let key = urlencoding::decode(url.path())
            .map_err(|e| ParameterError::InvalidUri(format!("{raw}: {e}")))?;

        Ok(Self::new(url.scheme(), bucket, key))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Key without leading or trailing slashes; empty for a bucket root
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key usable as a listing prefix for everything below this URI
    pub fn prefix(&self) -> String {
        if self.key.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key)
        }
    }

    /// Appends one or more `/`-separated segments
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            return self.clone();
        }

        let key = if self.key.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", self.key, segment)
        };

        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Returns a URI for another key in the same bucket
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self::new(self.scheme.clone(), self.bucket.clone(), key)
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
        }
    }
}

impl FromStr for ObjectUri {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectUri {
    type Error = ParameterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectUri> for String {
    fn from(uri: ObjectUri) -> Self {
        uri.to_string()
    }
}
