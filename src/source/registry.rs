//! Per-namespace global configuration

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use values_merge::ConfigTree;

use super::{parse_config_file, SourceError};
use crate::walk::{self, ConfigEntry};

/// Namespace → global configuration tree.
///
/// Built once before any service is processed and only read afterwards, so
/// workers share it by reference.
#[derive(Debug, Default, Clone)]
pub struct GlobalRegistry {
    globals: HashMap<String, ConfigTree>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find and parse every `global` file under `root`.
    pub fn build<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Result<Self, SourceError> {
        let mut registry = Self::new();
        let mut origins: HashMap<String, PathBuf> = HashMap::new();

        for path in walk::collect(root, extensions)? {
            let Some(ConfigEntry::Global { namespace }) = ConfigEntry::from_path(root, &path) else {
                continue;
            };

            if let Some(first) = origins.get(&namespace) {
                return Err(SourceError::DuplicateGlobal {
                    namespace,
                    first: first.clone(),
                    second: path,
                });
            }

            let tree = parse_config_file(&path)?;
            tracing::debug!(
                namespace = %namespace,
                path = %path.display(),
                keys = tree.len(),
                "loaded global"
            );
            origins.insert(namespace.clone(), path);
            registry.insert(namespace, tree);
        }

        tracing::info!(namespaces = registry.len(), "global registry built");
        Ok(registry)
    }

    pub fn insert(&mut self, namespace: impl Into<String>, tree: ConfigTree) {
        self.globals.insert(namespace.into(), tree);
    }

    pub fn get(&self, namespace: &str) -> Option<&ConfigTree> {
        self.globals.get(namespace)
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}
