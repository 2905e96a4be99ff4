//! Generator configuration
//!
//! Settings are resolved once at startup from three layers:
//! 1. Built-in defaults
//! 2. Config file (`--config`, TOML)
//! 3. CLI flags
//!
//! The result is one [`GeneratorConfig`] that is passed by reference to
//! everything that needs it.

mod defaults;
mod layer;

pub use defaults::{
    default_workers, DEFAULT_PREFIX, DEFAULT_REGION, DEFAULT_REMOTE_TIMEOUT,
    MAX_REMOTE_TIMEOUT_SECS,
};
pub use layer::ConfigLayer;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::detect::{ChangeDetector, DEFAULT_RETRIES, RETRY_BASE_DELAY};
use crate::fingerprint::FingerprintAlgorithm;
use crate::remote::{RemoteError, StoreLocation, StoreOptions};
use crate::walk::DEFAULT_EXTENSIONS;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting '{0}'")]
    Missing(&'static str),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("values directory {0} does not exist or is not a directory")]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Fully resolved generator settings
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Root of the per-namespace values tree
    pub source_dir: PathBuf,

    /// Destination directory for generated files
    pub destination_dir: PathBuf,

    /// Worker thread count (at least 1)
    pub workers: usize,

    /// Recognized configuration file extensions
    pub extensions: Vec<String>,

    /// Remote store; `None` disables change detection
    pub store: Option<StoreLocation>,

    /// Key prefix in the remote store
    pub prefix: String,

    /// Region for `s3://` stores
    pub region: String,

    pub fingerprint: FingerprintAlgorithm,

    /// Deadline of one remote lookup
    pub remote_timeout: Duration,

    /// Retries for transient remote failures
    pub retries: u32,

    /// Owner email for application descriptors
    pub email: Option<String>,
}

impl GeneratorConfig {
    /// Config with defaults for everything but the two directories
    pub fn new(source_dir: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_dir: destination_dir.into(),
            workers: default_workers(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            store: None,
            prefix: DEFAULT_PREFIX.to_string(),
            region: DEFAULT_REGION.to_string(),
            fingerprint: FingerprintAlgorithm::default(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            retries: DEFAULT_RETRIES,
            email: None,
        }
    }

    /// Resolve layers in precedence order (first is lowest)
    pub fn resolve(layers: Vec<ConfigLayer>) -> Result<Self, ConfigError> {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), ConfigLayer::overlay);

        let source_dir = merged.values.ok_or(ConfigError::Missing("values"))?;
        let destination_dir = merged.destination.ok_or(ConfigError::Missing("destination"))?;
        let mut config = Self::new(source_dir, destination_dir);

        if let Some(workers) = merged.workers {
            if workers > 0 {
                config.workers = usize::try_from(workers).map_err(|_| ConfigError::InvalidValue {
                    field: "workers",
                    reason: format!("{} is too large", workers),
                })?;
            }
        }
        if let Some(extensions) = merged.extensions {
            config.extensions = extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();
        }
        config.store = match (merged.store, merged.bucket) {
            (Some(store), _) => Some(store.parse()?),
            (None, Some(bucket)) => Some(format!("s3://{}", bucket).parse()?),
            (None, None) => None,
        };
        if let Some(prefix) = merged.prefix {
            config.prefix = prefix;
        }
        if let Some(region) = merged.region {
            config.region = region;
        }
        if let Some(fingerprint) = merged.fingerprint {
            config.fingerprint = fingerprint;
        }
        if let Some(secs) = merged.timeout_secs {
            config.remote_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = merged.retries {
            config.retries = retries;
        }
        config.email = merged.email;

        config.validate()?;
        Ok(config)
    }

    /// Check the settings before a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source_dir.is_dir() {
            return Err(ConfigError::SourceNotFound(self.source_dir.clone()));
        }
        if self.destination_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("destination"));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.extensions.is_empty() || self.extensions.iter().any(|e| e.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "extensions",
                reason: "must be a non-empty list of non-empty extensions".to_string(),
            });
        }
        let secs = self.remote_timeout.as_secs();
        if self.remote_timeout.is_zero() || secs > MAX_REMOTE_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                reason: format!("must be in (0, {}], got {}", MAX_REMOTE_TIMEOUT_SECS, secs),
            });
        }
        if self.store.is_some() && self.region.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "region",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Open the change detector, if a remote store is configured
    pub fn change_detector(&self) -> Result<Option<ChangeDetector>, RemoteError> {
        let Some(location) = &self.store else {
            return Ok(None);
        };
        let store = location.open(&StoreOptions {
            region: self.region.clone(),
            timeout: self.remote_timeout,
            algorithm: self.fingerprint,
        })?;
        tracing::info!(
            store = %store.describe(),
            prefix = %self.prefix,
            "change detection enabled"
        );
        Ok(Some(
            ChangeDetector::new(store, self.prefix.clone())
                .with_algorithm(self.fingerprint)
                .with_retries(self.retries, RETRY_BASE_DELAY),
        ))
    }
}
