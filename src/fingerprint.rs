//! Content fingerprints
//!
//! S3 reports the MD5 of a single-part object as its ETag, so MD5 is the
//! default. SHA-256 is available for stores that record it instead.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest used to fingerprint artifact content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl FingerprintAlgorithm {
    /// Lowercase hex digest of `content`
    pub fn digest(&self, content: &[u8]) -> String {
        match self {
            FingerprintAlgorithm::Md5 => hex::encode(Md5::digest(content)),
            FingerprintAlgorithm::Sha256 => hex::encode(Sha256::digest(content)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintAlgorithm::Md5 => "md5",
            FingerprintAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for FingerprintAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FingerprintAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(FingerprintAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(FingerprintAlgorithm::Sha256),
            other => Err(format!(
                "unknown fingerprint algorithm '{}' (expected md5 or sha256)",
                other
            )),
        }
    }
}

/// Compare two hex fingerprints, ignoring case and surrounding quotes
pub fn same_fingerprint(a: &str, b: &str) -> bool {
    normalize(a).eq_ignore_ascii_case(normalize(b))
}

/// Strip the quotes S3 puts around ETags
pub fn normalize(fingerprint: &str) -> &str {
    fingerprint.trim().trim_matches('"')
}
