//! S3 store: authenticated `HeadObject`, fingerprint from the ETag
//!
//! Credentials come from the SDK's default chain (environment, profile,
//! web identity, instance metadata). The SDK is async; lookups block the
//! calling worker on a small runtime owned by the store.

use std::time::Duration;

use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::Client;
use tokio::runtime::{Builder, Runtime};

use super::{RemoteEntry, RemoteError, RemoteKey, RemoteStore};
use crate::fingerprint;

/// Threads driving SDK I/O
const RUNTIME_THREADS: usize = 2;

#[derive(Debug)]
pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
    timeout: Duration,
}

impl S3Store {
    /// Store for `bucket` in `region`, using the default credential chain
    pub fn new(bucket: &str, region: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let runtime = runtime()?;
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build())
                .load(),
        );
        Ok(Self {
            runtime,
            client: Client::new(&sdk_config),
            bucket: bucket.to_string(),
            timeout,
        })
    }

    /// Store with an explicit client configuration (custom endpoint,
    /// static credentials)
    pub fn from_config(
        bucket: &str,
        config: aws_sdk_s3::Config,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            runtime: runtime()?,
            client: Client::from_conf(config),
            bucket: bucket.to_string(),
            timeout,
        })
    }
}

fn runtime() -> Result<Runtime, RemoteError> {
    Builder::new_multi_thread()
        .worker_threads(RUNTIME_THREADS)
        .thread_name("s3-lookup")
        .enable_all()
        .build()
        .map_err(|e| RemoteError::Client(e.to_string()))
}

impl RemoteStore for S3Store {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        let request = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send();
        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, request).await });

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return absent_or_error(key, err, self.timeout),
            Err(_) => {
                return Err(RemoteError::Timeout {
                    key: key.to_string(),
                    after: self.timeout,
                })
            }
        };

        let etag = output
            .e_tag()
            .map(fingerprint::normalize)
            .filter(|etag| !etag.is_empty())
            .ok_or_else(|| RemoteError::MalformedMetadata {
                key: key.to_string(),
                reason: "HeadObject returned no ETag".to_string(),
            })?;

        Ok(Some(RemoteEntry {
            fingerprint: etag.to_ascii_lowercase(),
        }))
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

/// `NotFound` is an answer, not a failure
fn absent_or_error(
    key: &RemoteKey,
    err: SdkError<HeadObjectError, HttpResponse>,
    after: Duration,
) -> Result<Option<RemoteEntry>, RemoteError> {
    if err.as_service_error().is_some_and(HeadObjectError::is_not_found) {
        return Ok(None);
    }
    let status = err.raw_response().map(|raw| raw.status().as_u16());
    if status == Some(404) {
        return Ok(None);
    }

    let key = key.to_string();
    let message = DisplayErrorContext(&err).to_string();
    Err(match &err {
        SdkError::TimeoutError(_) => RemoteError::Timeout { key, after },
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            RemoteError::Timeout { key, after }
        }
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            RemoteError::Transport { key, message }
        }
        SdkError::ConstructionFailure(_) => RemoteError::Client(message),
        _ => match status {
            Some(status) => RemoteError::Status { key, status },
            None => RemoteError::Transport { key, message },
        },
    })
}
