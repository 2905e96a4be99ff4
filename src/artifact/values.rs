//! Helm values file

use super::{ArtifactError, ArtifactKind};
use crate::decode::DecodedConfig;
use crate::remote::VALUES_EXTENSION;
use crate::walk::ServiceKey;

/// Rendered values of one service. Rendering happens up front because the
/// bytes are fingerprinted before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesArtifact {
    key: ServiceKey,
    content: Vec<u8>,
}

impl ValuesArtifact {
    pub fn render(key: &ServiceKey, decoded: &DecodedConfig) -> Result<Self, ArtifactError> {
        let content =
            serde_yaml::to_string(&decoded.helm_values()).map_err(|e| ArtifactError::Render {
                kind: ArtifactKind::Values,
                message: e.to_string(),
            })?;
        Ok(Self {
            key: key.clone(),
            content: content.into_bytes(),
        })
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.key.artifact_stem(), VALUES_EXTENSION)
    }
}
