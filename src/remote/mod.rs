//! Remote store of previously published values files
//!
//! The generator only ever looks entries up; publishing happens in a later,
//! separate step. A lookup either finds the entry's fingerprint, reports
//! that nothing was published under the key yet, or fails.

mod directory;
mod http;
mod memory;
mod s3;

pub use directory::DirectoryStore;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use s3::S3Store;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::fingerprint::FingerprintAlgorithm;
use crate::walk::ServiceKey;

/// Extension of published values files
pub const VALUES_EXTENSION: &str = "yaml";

/// Key of a values file in the remote store: `{prefix}/{service}-{namespace}.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteKey(String);

impl RemoteKey {
    pub fn for_service(prefix: &str, key: &ServiceKey) -> Self {
        let name = format!("{}.{}", key.artifact_stem(), VALUES_EXTENSION);
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            Self(name)
        } else {
            Self(format!("{}/{}", prefix, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of a published values file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Hex digest recorded by the store (quotes stripped)
    pub fingerprint: String,
}

/// Remote store lookup errors. "Not found" is not an error.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("lookup of '{key}' timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    #[error("lookup of '{key}' failed: {message}")]
    Transport { key: String, message: String },

    #[error("lookup of '{key}' returned HTTP {status}")]
    Status { key: String, status: u16 },

    #[error("malformed metadata for '{key}': {reason}")]
    MalformedMetadata { key: String, reason: String },

    #[error("failed to read '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid remote store location '{0}'")]
    InvalidLocation(String),

    #[error("failed to configure remote client: {0}")]
    Client(String),

    #[error("lookup of '{key}' abandoned, run canceled")]
    Canceled { key: String },
}

impl RemoteError {
    /// Whether retrying the same lookup may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Timeout { .. } | RemoteError::Transport { .. } => true,
            RemoteError::Status { status, .. } => *status == 429 || *status >= 500,
            RemoteError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            RemoteError::MalformedMetadata { .. }
            | RemoteError::InvalidLocation(_)
            | RemoteError::Client(_)
            | RemoteError::Canceled { .. } => false,
        }
    }
}

/// Read-only lookup of published fingerprints
pub trait RemoteStore: Send + Sync {
    /// `Ok(None)` when nothing is published under `key`
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

impl<T: RemoteStore + ?Sized> RemoteStore for Box<T> {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        (**self).head(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        (**self).head(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Where the remote store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// `s3://bucket`; region chosen at open time
    S3 { bucket: String },
    /// `http(s)://host/path` mirror, objects addressed as `{url}/{key}`
    Http(String),
    /// `file:///path` or a plain path: a local mirror of the store
    Directory(PathBuf),
}

impl FromStr for StoreLocation {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RemoteError::InvalidLocation(s.to_string()));
        }

        if let Some(bucket) = s.strip_prefix("s3://") {
            let bucket = bucket.trim_end_matches('/');
            if bucket.is_empty() || bucket.contains('/') {
                return Err(RemoteError::InvalidLocation(s.to_string()));
            }
            return Ok(StoreLocation::S3 {
                bucket: bucket.to_string(),
            });
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            reqwest::Url::parse(s).map_err(|_| RemoteError::InvalidLocation(s.to_string()))?;
            return Ok(StoreLocation::Http(s.trim_end_matches('/').to_string()));
        }

        if let Some(path) = s.strip_prefix("file://") {
            return Ok(StoreLocation::Directory(PathBuf::from(path)));
        }

        if s.contains("://") {
            return Err(RemoteError::InvalidLocation(s.to_string()));
        }

        Ok(StoreLocation::Directory(PathBuf::from(s)))
    }
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::S3 { bucket } => write!(f, "s3://{}", bucket),
            StoreLocation::Http(url) => f.write_str(url),
            StoreLocation::Directory(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Settings used to open a store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// AWS region of an `s3://` bucket
    pub region: String,
    /// Per-request deadline
    pub timeout: Duration,
    /// Digest used by directory mirrors
    pub algorithm: FingerprintAlgorithm,
}

impl StoreLocation {
    pub fn open(&self, options: &StoreOptions) -> Result<Box<dyn RemoteStore>, RemoteError> {
        let store: Box<dyn RemoteStore> = match self {
            StoreLocation::S3 { bucket } => {
                Box::new(S3Store::new(bucket, &options.region, options.timeout)?)
            }
            StoreLocation::Http(url) => Box::new(HttpStore::new(url, options.timeout)?),
            StoreLocation::Directory(path) => {
                Box::new(DirectoryStore::new(path.clone(), options.algorithm))
            }
        };
        Ok(store)
    }
}
