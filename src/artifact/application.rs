//! Spinnaker application descriptor

use serde::Serialize;

use crate::decode::DecodedConfig;

/// Cloud provider every generated application targets
pub const CLOUD_PROVIDER: &str = "kubernetes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDescriptor {
    pub name: String,
    /// Kubernetes account, from the chart's `kubernetesAccount` parameter
    pub accounts: String,
    pub cloud_providers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ApplicationDescriptor {
    pub fn new(service: &str, decoded: &DecodedConfig, email: Option<String>) -> Self {
        Self {
            name: service.to_string(),
            accounts: decoded.spinnaker.chart.kubernetes_account().to_string(),
            cloud_providers: CLOUD_PROVIDER.to_string(),
            email,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.name)
    }
}
