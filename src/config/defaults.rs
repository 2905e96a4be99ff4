//! Built-in defaults

use std::thread;
use std::time::Duration;

/// Key prefix of values files in the remote store
pub const DEFAULT_PREFIX: &str = "values";

/// Region assumed for `s3://` buckets
pub const DEFAULT_REGION: &str = "us-east-1";

/// Per-request deadline for remote lookups
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the remote lookup deadline, in seconds
pub const MAX_REMOTE_TIMEOUT_SECS: u64 = 300;

/// Worker count when none (or a non-positive one) is configured: one per core
pub fn default_workers() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
