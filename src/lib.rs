//! Application values generator
//!
//! Generates Helm values files and Spinnaker application/pipeline
//! descriptors from a tree of per-namespace YAML files, and skips values
//! files whose content matches what was already published to a remote
//! store.
//!
//! ```text
//! values/
//!   staging/
//!     global.yaml      namespace defaults
//!     checkout.yaml    service "checkout" in namespace "staging"
//! ```

pub mod artifact;
pub mod cancel;
pub mod config;
pub mod decode;
pub mod detect;
pub mod fingerprint;
pub mod pipeline;
pub mod remote;
pub mod source;
pub mod walk;

pub use artifact::{Artifact, ArtifactKind, OutputLayout, WriteOutcome};
pub use cancel::{CancelReason, CancelToken};
pub use config::{ConfigError, ConfigLayer, GeneratorConfig};
pub use decode::{decode, DecodedConfig};
pub use detect::ChangeDetector;
pub use fingerprint::FingerprintAlgorithm;
pub use pipeline::{GenerateError, Generator, RunSummary, ServiceOutcome, ValuesStatus};
pub use remote::{RemoteEntry, RemoteError, RemoteKey, RemoteStore, StoreLocation};
pub use source::GlobalRegistry;
pub use values_merge::{deep_merge, ConfigTree};
pub use walk::{ConfigEntry, ServiceKey};
