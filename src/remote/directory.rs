//! Local directory mirror of the remote store

use std::fs;
use std::io;
use std::path::PathBuf;

use super::{RemoteEntry, RemoteError, RemoteKey, RemoteStore};
use crate::fingerprint::FingerprintAlgorithm;

/// Store backed by a directory laid out like the bucket
/// (`{root}/{prefix}/{service}-{namespace}.yaml`). The fingerprint of an
/// entry is the digest of the file's bytes.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    algorithm: FingerprintAlgorithm,
}

impl DirectoryStore {
    pub fn new(root: PathBuf, algorithm: FingerprintAlgorithm) -> Self {
        Self { root, algorithm }
    }
}

impl RemoteStore for DirectoryStore {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        let path = self.root.join(key.as_str());
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(RemoteEntry {
                fingerprint: self.algorithm.digest(&bytes),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RemoteError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
