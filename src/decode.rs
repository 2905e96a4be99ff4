//! Typed view of a merged configuration tree
//!
//! Only the keys the generated artifacts need are decoded; anything else in
//! the tree is ignored. Missing keys and explicit nulls decode to the empty
//! value of their type.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use values_merge::ConfigTree;

/// Decoding failure (wrong type for a known key)
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct DecodeError(#[from] serde_yaml::Error);

/// Decoded service configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedConfig {
    #[serde(default, deserialize_with = "nullable")]
    pub replica_count: i64,

    #[serde(default, deserialize_with = "nullable")]
    pub environment_variables: BTreeMap<String, Value>,

    #[serde(default, deserialize_with = "nullable")]
    pub spinnaker: DeploymentTemplate,
}

/// `spinnaker:` block of a service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTemplate {
    /// Pipeline template id, referenced as `spinnaker://<id>`
    #[serde(default, deserialize_with = "nullable")]
    pub template_id: String,

    /// Regexp matched against image tags to trigger the pipeline
    #[serde(default, deserialize_with = "nullable")]
    pub trigger_regexp: String,

    #[serde(default, deserialize_with = "nullable")]
    pub chart: Chart,
}

/// Helm chart selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    /// Passed through as pipeline parameters
    #[serde(default, deserialize_with = "nullable")]
    pub parameters: BTreeMap<String, String>,
}

impl Chart {
    /// Chart parameter naming the Kubernetes account of the application
    pub const KUBERNETES_ACCOUNT: &'static str = "kubernetesAccount";

    pub fn kubernetes_account(&self) -> &str {
        self.parameters
            .get(Self::KUBERNETES_ACCOUNT)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// The Helm values written to `resources/`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmValues<'a> {
    pub replica_count: i64,
    pub environment_variables: &'a BTreeMap<String, Value>,
}

impl DecodedConfig {
    pub fn helm_values(&self) -> HelmValues<'_> {
        HelmValues {
            replica_count: self.replica_count,
            environment_variables: &self.environment_variables,
        }
    }
}

/// Decode a merged tree
pub fn decode(tree: ConfigTree) -> Result<DecodedConfig, DecodeError> {
    Ok(serde_yaml::from_value(Value::Mapping(tree))?)
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
