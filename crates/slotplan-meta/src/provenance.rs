//! Provenance: which service, template, inputs and parameters produced a file
use crate::sidecar::Sidecar;
use serde::{Deserialize, Serialize};
use slotplan_core::{ParameterValues, ServiceIdentity};

/// One contributing input file and its metadata at generation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceInput {
    pub filename: String,
    pub metadata: Sidecar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub serviceid: String,
    pub servicename: String,
    pub serviceurl: String,
    pub outputtemplate: String,
    pub outputtemplatelabel: String,
    /// UNIX timestamp in seconds
    pub timestamp: i64,
    #[serde(default)]
    pub inputfiles: Vec<ProvenanceInput>,
    #[serde(default)]
    pub parameters: ParameterValues,
}

impl Provenance {
    /// Provenance stamped with the current time.
    pub fn new(service: &ServiceIdentity, template_id: impl Into<String>, template_label: impl Into<String>) -> Self {
        Self {
            serviceid: service.id.clone(),
            servicename: service.name.clone(),
            serviceurl: service.url.clone(),
            outputtemplate: template_id.into(),
            outputtemplatelabel: template_label.into(),
            timestamp: chrono::Utc::now().timestamp(),
            inputfiles: Vec::new(),
            parameters: ParameterValues::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_input(mut self, filename: impl Into<String>, metadata: Sidecar) -> Self {
        self.inputfiles.push(ProvenanceInput {
            filename: filename.into(),
            metadata,
        });
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterValues) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn generated_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
    }
}
