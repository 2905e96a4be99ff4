//! Generation pipeline
//!
//! A run has two phases:
//! 1. Build the [`GlobalRegistry`] from every `global` file. Nothing else
//!    starts until it is complete.
//! 2. Walk the values tree on a producer thread and fan the paths out to a
//!    fixed pool of worker threads. Each worker, per service: parse, merge
//!    with the namespace globals, decode, check the remote store, write the
//!    values file (if changed), the application descriptor (if absent) and
//!    the pipeline descriptor.
//!
//! The first fatal error cancels the run: the walker stops emitting, idle
//! workers stop pulling, and `run` returns that error. Files already written
//! stay on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;

use thiserror::Error;
use values_merge::deep_merge;

use crate::artifact::{
    ApplicationDescriptor, Artifact, ArtifactError, OutputLayout, PipelineDescriptor,
    ValuesArtifact, WriteOutcome,
};
use crate::cancel::{CancelReason, CancelToken, EXIT_CODE_CANCELLED};
use crate::config::GeneratorConfig;
use crate::decode::{decode, DecodeError};
use crate::detect::ChangeDetector;
use crate::remote::{RemoteError, RemoteKey};
use crate::source::{parse_config_file, GlobalRegistry, SourceError};
use crate::walk::{self, ConfigEntry, ServiceKey, WalkError};

/// Paths buffered between the walker and the workers, per worker
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to load namespace globals: {0}")]
    Globals(#[source] SourceError),

    #[error("{key}: {source}")]
    Source {
        key: ServiceKey,
        #[source]
        source: SourceError,
    },

    #[error("{key}: {path}: {source}")]
    Decode {
        key: ServiceKey,
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("{key}: remote store lookup failed: {source}")]
    Remote {
        key: ServiceKey,
        #[source]
        source: RemoteError,
    },

    #[error("{key}: {source}")]
    Artifact {
        key: ServiceKey,
        #[source]
        source: ArtifactError,
    },

    #[error("{first} and {second} both generate '{stem}' artifacts")]
    DuplicateArtifact {
        stem: String,
        first: ServiceKey,
        second: ServiceKey,
    },

    #[error("failed to walk values directory: {0}")]
    Walk(#[source] WalkError),

    #[error("generation canceled")]
    Canceled,

    #[error("a generation worker panicked")]
    WorkerPanicked,
}

impl GenerateError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GenerateError::Globals(_)
            | GenerateError::Source { .. }
            | GenerateError::Decode { .. }
            | GenerateError::DuplicateArtifact { .. } => 1,
            GenerateError::Artifact { .. } | GenerateError::Walk(_) => 2,
            GenerateError::Remote { .. } => 3,
            GenerateError::Canceled => EXIT_CODE_CANCELLED,
            GenerateError::WorkerPanicked => 101,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, GenerateError::Canceled)
    }
}

/// What happened to a service's values file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuesStatus {
    Written(PathBuf),
    /// Same fingerprint as the published copy
    Unchanged,
}

/// Result of generating one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOutcome {
    pub key: ServiceKey,
    pub values: ValuesStatus,
    pub application: WriteOutcome,
    pub pipeline: WriteOutcome,
}

impl ServiceOutcome {
    /// One-line progress message
    pub fn describe(&self) -> String {
        let values = match self.values {
            ValuesStatus::Written(_) => "values written",
            ValuesStatus::Unchanged => "values unchanged",
        };
        let application = if self.application.is_written() {
            "application written"
        } else {
            "application exists"
        };
        format!("{}: {}, {}, pipeline written", self.key, values, application)
    }
}

/// Result of a complete run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Generated services, in completion order
    pub services: Vec<ServiceOutcome>,
    /// Files that belong to no namespace
    pub skipped: Vec<PathBuf>,
}

impl RunSummary {
    pub fn values_written(&self) -> usize {
        self.services
            .iter()
            .filter(|s| matches!(s.values, ValuesStatus::Written(_)))
            .count()
    }

    pub fn values_unchanged(&self) -> usize {
        self.services.len() - self.values_written()
    }

    pub fn applications_written(&self) -> usize {
        self.services.iter().filter(|s| s.application.is_written()).count()
    }
}

/// Per-run shared state handed to every worker
struct RunState<'r> {
    registry: &'r GlobalRegistry,
    paths: Mutex<std::sync::mpsc::Receiver<PathBuf>>,
    first_error: Mutex<Option<GenerateError>>,
    summary: Mutex<RunSummary>,
    /// Artifact stem → service that claimed it
    stems: Mutex<HashMap<String, ServiceKey>>,
}

impl RunState<'_> {
    /// Reserve the output paths of `key`. Distinct namespaces can flatten
    /// to the same stem (`a-b/c` and `a/b-c`).
    fn claim_stem(&self, key: &ServiceKey) -> Result<(), GenerateError> {
        let stem = key.artifact_stem();
        let mut stems = lock(&self.stems);
        match stems.get(&stem) {
            Some(first) if first != key => Err(GenerateError::DuplicateArtifact {
                stem,
                first: first.clone(),
                second: key.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                stems.insert(stem, key.clone());
                Ok(())
            }
        }
    }

    /// Keep the first error; later ones are consequences of the cancel
    fn record_error(&self, err: GenerateError) {
        let mut slot = lock(&self.first_error);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking worker is reported separately; its data is still usable
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Generates artifacts for every service under the configured source tree
pub struct Generator<'a> {
    config: &'a GeneratorConfig,
    layout: OutputLayout,
    detector: Option<ChangeDetector>,
    cancel: CancelToken,
}

impl<'a> Generator<'a> {
    /// Generator without change detection: every values file is written
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self {
            config,
            layout: OutputLayout::new(&config.destination_dir),
            detector: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_detector(mut self, detector: Option<ChangeDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Share a cancellation token with the caller (e.g. a signal handler)
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run without progress reporting
    pub fn run(&self) -> Result<RunSummary, GenerateError> {
        self.run_with(|_| {})
    }

    /// Run, calling `on_service` from the worker thread after each service
    pub fn run_with<F>(&self, on_service: F) -> Result<RunSummary, GenerateError>
    where
        F: Fn(&ServiceOutcome) + Sync,
    {
        let config = self.config;

        // Phase 1: globals must be complete before any merge
        let registry = GlobalRegistry::build(&config.source_dir, &config.extensions)
            .map_err(GenerateError::Globals)?;

        if self.cancel.is_cancelled() {
            return Err(GenerateError::Canceled);
        }

        // Phase 2: fan out
        let workers = config.workers.max(1);
        let (paths, walker) = walk::walk(
            &config.source_dir,
            &config.extensions,
            self.cancel.clone(),
            workers * QUEUE_DEPTH_PER_WORKER,
        );
        let state = RunState {
            registry: &registry,
            paths: Mutex::new(paths),
            first_error: Mutex::new(None),
            summary: Mutex::new(RunSummary::default()),
            stems: Mutex::new(HashMap::new()),
        };
        tracing::info!(workers, source = %config.source_dir.display(), "generation started");

        let mut panicked = false;
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let state = &state;
                    let on_service = &on_service;
                    scope.spawn(move || self.work(id, state, on_service))
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    panicked = true;
                    self.cancel.cancel(CancelReason::Failure);
                }
            }
        });

        // Unblocks a walker still waiting on a full queue
        let RunState {
            paths,
            first_error,
            summary,
            ..
        } = state;
        drop(paths);
        let walked = walker.finish();

        if let Some(err) = first_error.into_inner().unwrap_or_else(|p| p.into_inner()) {
            tracing::error!(error = %err, "generation failed");
            return Err(err);
        }
        if panicked {
            return Err(GenerateError::WorkerPanicked);
        }
        if self.cancel.reason() == Some(CancelReason::Interrupted) {
            return Err(GenerateError::Canceled);
        }

        match walked {
            Ok(files) => {
                let summary = summary.into_inner().unwrap_or_else(|p| p.into_inner());
                tracing::info!(
                    files,
                    services = summary.services.len(),
                    values_written = summary.values_written(),
                    "generation finished"
                );
                Ok(summary)
            }
            Err(WalkError::Canceled) => Err(GenerateError::Canceled),
            Err(err) => Err(GenerateError::Walk(err)),
        }
    }

    fn work<F>(&self, id: usize, state: &RunState<'_>, on_service: &F)
    where
        F: Fn(&ServiceOutcome) + Sync,
    {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(worker = id, "worker stopping, run canceled");
                return;
            }

            let next = lock(&state.paths).recv();
            let Ok(path) = next else {
                // Walker done and queue drained
                return;
            };
            if self.cancel.is_cancelled() {
                return;
            }

            let key = match ConfigEntry::from_path(&self.config.source_dir, &path) {
                Some(ConfigEntry::Service(key)) => key,
                Some(ConfigEntry::Global { .. }) => continue,
                None => {
                    tracing::warn!(path = %path.display(), "skipping file outside any namespace");
                    lock(&state.summary).skipped.push(path);
                    continue;
                }
            };

            let result = state
                .claim_stem(&key)
                .and_then(|()| self.generate_service(state.registry, &key, &path));
            match result {
                Ok(outcome) => {
                    on_service(&outcome);
                    lock(&state.summary).services.push(outcome);
                }
                // Another failure or an interrupt stopped this lookup
                Err(GenerateError::Canceled) => return,
                Err(err) => {
                    tracing::debug!(worker = id, key = %key, error = %err, "service failed");
                    state.record_error(err);
                    self.cancel.cancel(CancelReason::Failure);
                    return;
                }
            }
        }
    }

    /// Generate the three artifacts of one service
    pub fn generate_service(
        &self,
        registry: &GlobalRegistry,
        key: &ServiceKey,
        path: &Path,
    ) -> Result<ServiceOutcome, GenerateError> {
        tracing::debug!(key = %key, path = %path.display(), "generating");

        let tree = parse_config_file(path).map_err(|source| GenerateError::Source {
            key: key.clone(),
            source,
        })?;
        let merged = match registry.get(&key.namespace) {
            Some(global) => deep_merge(tree, global),
            None => tree,
        };
        let decoded = decode(merged).map_err(|source| GenerateError::Decode {
            key: key.clone(),
            path: path.to_path_buf(),
            source,
        })?;

        let artifact_err = |source: ArtifactError| GenerateError::Artifact {
            key: key.clone(),
            source,
        };

        let values = ValuesArtifact::render(key, &decoded).map_err(artifact_err)?;
        let publish = match &self.detector {
            Some(detector) => {
                let remote_key = RemoteKey::for_service(detector.prefix(), key);
                detector
                    .should_publish(values.content(), &remote_key, &self.cancel)
                    .map_err(|source| match source {
                        RemoteError::Canceled { .. } => GenerateError::Canceled,
                        source => GenerateError::Remote {
                            key: key.clone(),
                            source,
                        },
                    })?
            }
            None => true,
        };

        let values = if publish {
            let outcome = Artifact::Values(values).write(&self.layout).map_err(artifact_err)?;
            ValuesStatus::Written(outcome.path().to_path_buf())
        } else {
            tracing::debug!(key = %key, "values unchanged, not rewriting");
            ValuesStatus::Unchanged
        };

        let application = Artifact::Application(ApplicationDescriptor::new(
            &key.service,
            &decoded,
            self.config.email.clone(),
        ))
        .write(&self.layout)
        .map_err(artifact_err)?;

        let pipeline = Artifact::Pipeline(PipelineDescriptor::new(key, &decoded))
            .write(&self.layout)
            .map_err(artifact_err)?;

        Ok(ServiceOutcome {
            key: key.clone(),
            values,
            application,
            pipeline,
        })
    }
}
