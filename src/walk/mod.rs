//! Resource tree walker
//!
//! Walks the source directory and streams every configuration file to the
//! generation workers over a bounded channel. The walk runs on its own
//! thread; its result is collected with [`WalkHandle::finish`] once the
//! consumers are done.

mod key;

pub use key::{ConfigEntry, ServiceKey, GLOBAL_STEM};

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use walkdir::WalkDir;

use crate::cancel::CancelToken;

/// Extensions recognized as configuration files
pub const DEFAULT_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Errors reported when a walk completes
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("walk canceled")]
    Canceled,

    #[error("failed to walk {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("walker thread panicked")]
    Panicked,
}

/// Completion signal of a background walk
#[derive(Debug)]
pub struct WalkHandle {
    handle: JoinHandle<Result<usize, WalkError>>,
}

impl WalkHandle {
    /// Wait for the walker thread and return the number of paths emitted.
    ///
    /// The receiver must have been dropped (or drained) first, otherwise a
    /// walker blocked on a full channel never returns.
    pub fn finish(self) -> Result<usize, WalkError> {
        self.handle.join().map_err(|_| WalkError::Panicked)?
    }
}

/// True if the path's extension is one of `extensions` (without the dot)
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) => extensions.iter().any(|e| e.as_ref() == ext),
        None => false,
    }
}

/// Iterate the configuration files under `root`, in file-name order
fn config_files<'a, S: AsRef<str> + 'a>(
    root: &'a Path,
    extensions: &'a [S],
) -> impl Iterator<Item = Result<PathBuf, WalkError>> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                // Directories, symlinks and special files are skipped
                if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                    Some(Ok(entry.into_path()))
                } else {
                    None
                }
            }
            Err(source) => Some(Err(WalkError::Io {
                path: source.path().unwrap_or(root).to_path_buf(),
                source,
            })),
        })
}

/// Collect every configuration file under `root` synchronously
pub fn collect<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Result<Vec<PathBuf>, WalkError> {
    config_files(root, extensions).collect()
}

/// Start walking `root` on a background thread.
///
/// At most `capacity` paths are buffered ahead of the consumers. The walker
/// checks `cancel` before every emit and stops with [`WalkError::Canceled`]
/// once it is set, or once every receiver has been dropped.
pub fn walk(
    root: &Path,
    extensions: &[String],
    cancel: CancelToken,
    capacity: usize,
) -> (Receiver<PathBuf>, WalkHandle) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let root = root.to_path_buf();
    let extensions = extensions.to_vec();

    let handle = thread::spawn(move || produce(&root, &extensions, &cancel, &tx));

    (rx, WalkHandle { handle })
}

fn produce(
    root: &Path,
    extensions: &[String],
    cancel: &CancelToken,
    tx: &SyncSender<PathBuf>,
) -> Result<usize, WalkError> {
    let mut emitted = 0;
    for path in config_files(root, extensions) {
        let path = path?;
        if cancel.is_cancelled() {
            tracing::debug!(emitted, "walk stopped by cancellation");
            return Err(WalkError::Canceled);
        }
        if tx.send(path).is_err() {
            tracing::debug!(emitted, "walk stopped, no consumers left");
            return Err(WalkError::Canceled);
        }
        emitted += 1;
    }
    Ok(emitted)
}
