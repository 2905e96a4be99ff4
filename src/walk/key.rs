//! Path → namespace/service classification

use std::fmt;
use std::path::{Component, Path};

/// File stem reserved for namespace defaults
pub const GLOBAL_STEM: &str = "global";

/// One unit of generation: a service inside a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    /// Directory of the file relative to the source root, `/`-separated
    pub namespace: String,
    /// File stem
    pub service: String,
}

impl ServiceKey {
    pub fn new(namespace: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
        }
    }

    /// `{service}-{namespace}`, the stem shared by the values artifact, the
    /// pipeline descriptor and the remote key. Nested namespaces are
    /// flattened with `-` so the result is always a single path segment.
    pub fn artifact_stem(&self) -> String {
        format!("{}-{}", self.service, self.namespace.replace('/', "-"))
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.service)
    }
}

/// What a discovered configuration file is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEntry {
    /// `<namespace>/global.yaml`
    Global { namespace: String },
    /// Any other file inside a namespace
    Service(ServiceKey),
}

impl ConfigEntry {
    /// Classify `path`, which must live under `root`.
    ///
    /// Returns `None` for files outside the root, directly in the root (they
    /// have no namespace), or without a file stem.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let parent = relative.parent()?;

        let segments: Vec<String> = parent
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            return None;
        }
        let namespace = segments.join("/");

        let stem = relative.file_stem()?.to_string_lossy().into_owned();
        if stem.is_empty() {
            return None;
        }

        if stem == GLOBAL_STEM {
            Some(ConfigEntry::Global { namespace })
        } else {
            Some(ConfigEntry::Service(ServiceKey::new(namespace, stem)))
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            ConfigEntry::Global { namespace } => namespace,
            ConfigEntry::Service(key) => &key.namespace,
        }
    }
}
