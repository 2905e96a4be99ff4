//! Configuration source: parsing YAML files into configuration trees

mod registry;

pub use registry::GlobalRegistry;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use values_merge::ConfigTree;

/// Errors reading or parsing configuration files
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: top level must be a mapping, found {found}")]
    NotAMapping { path: PathBuf, found: &'static str },

    #[error("namespace '{namespace}' has more than one global file: {first} and {second}")]
    DuplicateGlobal {
        namespace: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error(transparent)]
    Walk(#[from] crate::walk::WalkError),
}

/// Read and parse one configuration file.
///
/// An empty document parses as an empty tree.
pub fn parse_config_file(path: &Path) -> Result<ConfigTree, SourceError> {
    let contents = fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(path, &contents)
}

/// Parse configuration text; `path` is only used for error messages.
pub fn parse_config_str(path: &Path, contents: &str) -> Result<ConfigTree, SourceError> {
    let value: Value = serde_yaml::from_str(contents).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Mapping(tree) => Ok(tree),
        Value::Null => Ok(ConfigTree::new()),
        other => Err(SourceError::NotAMapping {
            path: path.to_path_buf(),
            found: kind_name(&other),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
