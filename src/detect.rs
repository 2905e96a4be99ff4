//! Change detection against the remote store
//!
//! A values file is published when nothing was published under its key
//! yet, or when its fingerprint differs from the published one. Lookup
//! failures never count as "unchanged". Retries stop as soon as the run is
//! canceled.

use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::fingerprint::{self, FingerprintAlgorithm};
use crate::remote::{RemoteEntry, RemoteError, RemoteKey, RemoteStore};

/// Default number of retries for transient lookup failures
pub const DEFAULT_RETRIES: u32 = 2;

/// Base delay between retries; attempt `n` waits `n * base`
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Decides whether a candidate values file needs publishing
pub struct ChangeDetector {
    store: Box<dyn RemoteStore>,
    prefix: String,
    algorithm: FingerprintAlgorithm,
    retries: u32,
    retry_delay: Duration,
}

impl ChangeDetector {
    pub fn new(store: Box<dyn RemoteStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            algorithm: FingerprintAlgorithm::default(),
            retries: DEFAULT_RETRIES,
            retry_delay: RETRY_BASE_DELAY,
        }
    }

    pub fn with_algorithm(mut self, algorithm: FingerprintAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_retries(mut self, retries: u32, base_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = base_delay;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True if `content` must be published under `key`
    pub fn should_publish(
        &self,
        content: &[u8],
        key: &RemoteKey,
        cancel: &CancelToken,
    ) -> Result<bool, RemoteError> {
        let Some(entry) = self.lookup(key, cancel)? else {
            tracing::debug!(key = %key, "not published yet");
            return Ok(true);
        };

        let local = self.algorithm.digest(content);
        let changed = !fingerprint::same_fingerprint(&local, &entry.fingerprint);
        tracing::debug!(
            key = %key,
            local = %local,
            remote = %entry.fingerprint,
            changed,
            "compared fingerprints"
        );
        Ok(changed)
    }

    fn lookup(
        &self,
        key: &RemoteKey,
        cancel: &CancelToken,
    ) -> Result<Option<RemoteEntry>, RemoteError> {
        let mut attempt = 0;
        loop {
            match self.store.head(key) {
                Ok(entry) => return Ok(entry),
                Err(err) if err.is_transient() && attempt < self.retries => {
                    if cancel.is_cancelled() {
                        return Err(RemoteError::Canceled {
                            key: key.to_string(),
                        });
                    }
                    attempt += 1;
                    tracing::warn!(
                        key = %key,
                        attempt,
                        error = %err,
                        "remote lookup failed, retrying"
                    );
                    thread::sleep(self.retry_delay * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
