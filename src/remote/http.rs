//! HTTP store: `HEAD {endpoint}/{key}`, fingerprint from the `ETag` header

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ETAG;
use reqwest::StatusCode;

use super::{RemoteEntry, RemoteError, RemoteKey, RemoteStore};
use crate::fingerprint;

/// Mirror reachable over plain HTTP(S) without request signing (public
/// buckets, static mirrors)
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn object_url(&self, key: &RemoteKey) -> String {
        format!("{}/{}", self.endpoint, key.as_str().trim_start_matches('/'))
    }
}

impl RemoteStore for HttpStore {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        let url = self.object_url(key);
        let response = self.client.head(&url).send().map_err(|e| {
            if e.is_timeout() {
                RemoteError::Timeout {
                    key: key.to_string(),
                    after: self.timeout,
                }
            } else {
                RemoteError::Transport {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .ok_or_else(|| RemoteError::MalformedMetadata {
                key: key.to_string(),
                reason: "response has no ETag header".to_string(),
            })?
            .to_str()
            .map_err(|_| RemoteError::MalformedMetadata {
                key: key.to_string(),
                reason: "ETag header is not ASCII".to_string(),
            })?;

        let fingerprint = fingerprint::normalize(etag);
        if fingerprint.is_empty() {
            return Err(RemoteError::MalformedMetadata {
                key: key.to_string(),
                reason: "empty ETag".to_string(),
            });
        }

        Ok(Some(RemoteEntry {
            fingerprint: fingerprint.to_ascii_lowercase(),
        }))
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url() {
        let store = HttpStore::new("https://mirror.local/deploy/", Duration::from_secs(5)).unwrap();
        let key = RemoteKey("values/checkout-staging.yaml".to_string());
        assert_eq!(
            store.object_url(&key),
            "https://mirror.local/deploy/values/checkout-staging.yaml"
        );
    }

    #[test]
    fn test_unreachable_endpoint_is_an_error() {
        // Port 9 (discard) on localhost is closed on test machines
        let store = HttpStore::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let key = RemoteKey("values/a-b.yaml".to_string());
        let err = store.head(&key).unwrap_err();
        assert!(err.is_transient());
    }
}
