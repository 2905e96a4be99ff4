//! One layer of optional settings (config file or CLI flags)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::fingerprint::FingerprintAlgorithm;

/// Partial configuration. Later layers override earlier ones field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    /// Values files location
    pub values: Option<PathBuf>,

    /// Generated files end up here
    pub destination: Option<PathBuf>,

    /// Remote store location (`s3://bucket`, `https://...`, or a directory)
    pub store: Option<String>,

    /// S3 bucket holding previously published values; shorthand for `store = "s3://<bucket>"`
    pub bucket: Option<String>,

    /// S3 bucket region
    pub region: Option<String>,

    /// Key prefix of values files in the store
    pub prefix: Option<String>,

    /// Number of worker threads; zero or negative means one per core
    pub workers: Option<i64>,

    /// Recognized configuration file extensions
    pub extensions: Option<Vec<String>>,

    pub fingerprint: Option<FingerprintAlgorithm>,

    /// Remote lookup deadline in seconds
    pub timeout_secs: Option<u64>,

    /// Retries for transient remote failures
    pub retries: Option<u32>,

    /// Owner email written into application descriptors
    pub email: Option<String>,
}

impl ConfigLayer {
    /// Load a layer from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    pub fn from_toml(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `other` on top of `self`
    pub fn overlay(mut self, other: ConfigLayer) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            values,
            destination,
            region,
            prefix,
            workers,
            extensions,
            fingerprint,
            timeout_secs,
            retries,
            email
        );

        // store and bucket name the same thing; the layer that sets either wins
        if other.store.is_some() || other.bucket.is_some() {
            self.store = other.store;
            self.bucket = other.bucket;
        }
        self
    }
}
