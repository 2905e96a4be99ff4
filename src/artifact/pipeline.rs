//! Spinnaker templated pipeline descriptor

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::decode::DecodedConfig;
use crate::walk::ServiceKey;

const ARTIFACT_ACCOUNT: &str = "front50ArtifactCredentials";
const TEMPLATE_TYPE: &str = "front50/pipelineTemplate";
const PIPELINE_TYPE: &str = "templatedPipeline";
const SCHEMA: &str = "v2";

/// Reference to a stored pipeline template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTemplateRef {
    pub artifact_account: String,
    /// `spinnaker://{templateId}`
    pub reference: String,
    #[serde(rename = "type")]
    pub template_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescriptor {
    pub app_config: HashMap<String, String>,
    pub limit_concurrent: bool,
    pub schema: String,
    pub template: PipelineTemplateRef,
    #[serde(rename = "type")]
    pub pipeline_type: String,
    /// Service name
    pub application: String,
    /// Namespace
    pub name: String,
    /// Chart parameters plus `serviceName`, `namespace` and `triggerRegexp`
    pub parameters: BTreeMap<String, String>,
    #[serde(skip)]
    file_stem: String,
}

impl PipelineDescriptor {
    pub fn new(key: &ServiceKey, decoded: &DecodedConfig) -> Self {
        let spinnaker = &decoded.spinnaker;

        let mut parameters = spinnaker.chart.parameters.clone();
        parameters.insert("serviceName".to_string(), key.service.clone());
        parameters.insert("namespace".to_string(), key.namespace.clone());
        parameters.insert("triggerRegexp".to_string(), spinnaker.trigger_regexp.clone());

        Self {
            app_config: HashMap::new(),
            limit_concurrent: true,
            schema: SCHEMA.to_string(),
            template: PipelineTemplateRef {
                artifact_account: ARTIFACT_ACCOUNT.to_string(),
                reference: format!("spinnaker://{}", spinnaker.template_id),
                template_type: TEMPLATE_TYPE.to_string(),
            },
            pipeline_type: PIPELINE_TYPE.to_string(),
            application: key.service.clone(),
            name: key.namespace.clone(),
            parameters,
            file_stem: key.artifact_stem(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.file_stem)
    }
}
