//! Generated artifacts
//!
//! Three kinds of files are produced per service:
//! - `resources/{service}-{namespace}.yaml`: Helm values
//! - `applications/{service}.json`: Spinnaker application, one per service name
//! - `pipelines/{service}-{namespace}.json`: Spinnaker templated pipeline
//!
//! Every kind knows its own path and serialization; callers go through
//! [`Artifact`] and never special-case a kind except to read the outcome.

mod application;
mod pipeline;
mod values;

pub use application::ApplicationDescriptor;
pub use pipeline::{PipelineDescriptor, PipelineTemplateRef};
pub use values::ValuesArtifact;

use std::borrow::Cow;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Subdirectory for values files
pub const RESOURCES_DIR: &str = "resources";
/// Subdirectory for application descriptors
pub const APPLICATIONS_DIR: &str = "applications";
/// Subdirectory for pipeline descriptors
pub const PIPELINES_DIR: &str = "pipelines";

/// Artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Values,
    Application,
    Pipeline,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Values => "values",
            ArtifactKind::Application => "application",
            ArtifactKind::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors rendering or writing artifacts
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to render {kind}: {message}")]
    Render { kind: ArtifactKind, message: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Destination directory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        let sub = match kind {
            ArtifactKind::Values => RESOURCES_DIR,
            ArtifactKind::Application => APPLICATIONS_DIR,
            ArtifactKind::Pipeline => PIPELINES_DIR,
        };
        self.root.join(sub)
    }

    /// Create the three output directories
    pub fn create_dirs(&self) -> Result<(), ArtifactError> {
        for kind in [ArtifactKind::Values, ArtifactKind::Application, ArtifactKind::Pipeline] {
            let dir = self.dir(kind);
            fs::create_dir_all(&dir).map_err(|source| ArtifactError::Write { path: dir, source })?;
        }
        Ok(())
    }
}

/// Result of writing one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// Write-once artifact that already existed
    Skipped(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written(p) | WriteOutcome::Skipped(p) => p,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written(_))
    }
}

/// One generated file
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Values(ValuesArtifact),
    Application(ApplicationDescriptor),
    Pipeline(PipelineDescriptor),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Values(_) => ArtifactKind::Values,
            Artifact::Application(_) => ArtifactKind::Application,
            Artifact::Pipeline(_) => ArtifactKind::Pipeline,
        }
    }

    /// File name inside the kind's directory
    pub fn file_name(&self) -> String {
        match self {
            Artifact::Values(v) => v.file_name(),
            Artifact::Application(a) => a.file_name(),
            Artifact::Pipeline(p) => p.file_name(),
        }
    }

    pub fn path(&self, layout: &OutputLayout) -> PathBuf {
        layout.dir(self.kind()).join(self.file_name())
    }

    /// Serialized file content
    pub fn render(&self) -> Result<Cow<'_, [u8]>, ArtifactError> {
        match self {
            Artifact::Values(v) => Ok(Cow::Borrowed(v.content())),
            Artifact::Application(a) => render_json(ArtifactKind::Application, a).map(Cow::Owned),
            Artifact::Pipeline(p) => render_json(ArtifactKind::Pipeline, p).map(Cow::Owned),
        }
    }

    /// Application descriptors are shared by every namespace of a service
    /// and are only written when absent
    pub fn is_write_once(&self) -> bool {
        matches!(self, Artifact::Application(_))
    }

    /// Render and write into `layout`. The target directory must exist.
    pub fn write(&self, layout: &OutputLayout) -> Result<WriteOutcome, ArtifactError> {
        let path = self.path(layout);
        let content = self.render()?;

        if self.is_write_once() {
            return write_once(path, &content);
        }

        fs::write(&path, &content).map_err(|source| ArtifactError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(WriteOutcome::Written(path))
    }
}

fn render_json<T: serde::Serialize>(
    kind: ArtifactKind,
    value: &T,
) -> Result<Vec<u8>, ArtifactError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| ArtifactError::Render {
        kind,
        message: e.to_string(),
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Create `path` exclusively. Losing the race to another writer, or finding
/// a file from an earlier run, is not an error.
fn write_once(path: PathBuf, content: &[u8]) -> Result<WriteOutcome, ArtifactError> {
    create_exclusive(path, |file| file.write_all(content))
}

/// Run `fill` on a temporary file beside `path`, then link it into place
/// unless `path` exists. `path` only ever appears complete.
fn create_exclusive<F>(path: PathBuf, fill: F) -> Result<WriteOutcome, ArtifactError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let write_err = |source| ArtifactError::Write {
        path: path.clone(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    fill(tmp.as_file_mut()).map_err(write_err)?;

    match tmp.persist_noclobber(&path) {
        Ok(_) => Ok(WriteOutcome::Written(path)),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Ok(WriteOutcome::Skipped(path))
        }
        Err(e) => Err(ArtifactError::Write {
            path,
            source: e.error,
        }),
    }
}
