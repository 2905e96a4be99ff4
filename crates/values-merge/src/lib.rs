//! Service-over-global deep merge for YAML configuration trees.
//!
//! A namespace's `global` file provides defaults for every service in that
//! namespace. Merging walks the global tree and only fills gaps in the
//! service tree:
//! - Key missing in the service: global value is inserted
//! - Both values are mappings: merge recursively
//! - Anything else: the service value wins untouched
//!
//! The global tree is only ever borrowed, so one tree can serve every
//! service of a namespace, from any number of threads.

use serde_yaml::{Mapping, Value};

/// One parsed configuration file.
pub type ConfigTree = Mapping;

/// Merge `global` into `service` and return the merged tree.
///
/// Takes ownership of the service tree; the result is that same tree with
/// the gaps filled in.
pub fn deep_merge(mut service: ConfigTree, global: &ConfigTree) -> ConfigTree {
    merge_into(&mut service, global);
    service
}

/// In-place variant of [`deep_merge`].
pub fn merge_into(service: &mut ConfigTree, global: &ConfigTree) {
    for (key, global_value) in global {
        match service.get_mut(key) {
            None => {
                service.insert(key.clone(), global_value.clone());
            }
            Some(Value::Mapping(local)) => {
                // A global scalar under a service mapping leaves the mapping alone
                if let Value::Mapping(nested) = global_value {
                    merge_into(local, nested);
                }
            }
            // Scalars, sequences, tagged values and explicit nulls all win
            Some(_) => {}
        }
    }
}
