//! Metadata sidecars
//!
//! Every file `name` in a project directory may carry its metadata in a
//! sibling `.name.METADATA` JSON document:
//!
//! ```json
//! {
//!   "format": "PlainTextFormat",
//!   "inputtemplate": "text",
//!   "attributes": [{"id": "encoding", "value": "utf-8"}],
//!   "provenance": {...},
//!   "constraints": [...]
//! }
//! ```

use crate::fs_atomic::atomic_write_file;
use crate::provenance::Provenance;
use crate::record::MetadataRecord;
use serde::{Deserialize, Serialize};
use slotplan_core::{EngineError, FormatRegistry, Value};
use slotplan_policy::Constraint;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SIDECAR_SUFFIX: &str = ".METADATA";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub id: String,
    pub value: Value,
}

/// Serialisable form of a [`MetadataRecord`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputtemplate: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
}

impl Sidecar {
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Serialize(e.to_string()))
    }

    pub fn from_json(path: &str, json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::parse(path, e))
    }
}

impl MetadataRecord {
    pub fn to_sidecar(&self) -> Sidecar {
        Sidecar {
            format: self.format().id.clone(),
            inputtemplate: self.input_template().map(str::to_string),
            attributes: self
                .attributes()
                .iter()
                .map(|(id, value)| AttributeEntry {
                    id: id.clone(),
                    value: value.clone(),
                })
                .collect(),
            provenance: self.provenance().cloned(),
            constraints: self.constraints().to_vec(),
        }
    }

    /// Rebuild a record, resolving the format id through `formats`.
    pub fn from_sidecar(sidecar: Sidecar, formats: &FormatRegistry) -> Result<Self, EngineError> {
        let format = formats.resolve(&sidecar.format)?;
        let attributes = sidecar
            .attributes
            .into_iter()
            .map(|entry| (entry.id, entry.value))
            .collect();
        let mut record = MetadataRecord::new(format)
            .with_attributes(attributes)
            .with_constraints(sidecar.constraints);
        if let Some(provenance) = sidecar.provenance {
            record = record.with_provenance(provenance);
        }
        if let Some(template) = sidecar.inputtemplate {
            record = record.with_input_template(template);
        }
        Ok(record)
    }
}

/// `dir/.name.METADATA` for `dir/name`
pub fn sidecar_path(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.with_file_name(format!(".{}{}", name, SIDECAR_SUFFIX))
}

pub fn write_sidecar(file: &Path, record: &MetadataRecord) -> Result<PathBuf, EngineError> {
    let path = sidecar_path(file);
    let json = record.to_sidecar().to_json()?;
    atomic_write_file(&path, json.as_bytes()).map_err(|e| EngineError::io(path.display().to_string(), e))?;
    debug!(path = %path.display(), "wrote metadata sidecar");
    Ok(path)
}

/// Read the sidecar of `file`; `None` when the file has none.
pub fn read_sidecar(file: &Path, formats: &FormatRegistry) -> Result<Option<MetadataRecord>, EngineError> {
    let path = sidecar_path(file);
    if !path.exists() {
        return Ok(None);
    }
    let display = path.display().to_string();
    let json = std::fs::read_to_string(&path).map_err(|e| EngineError::io(display.clone(), e))?;
    let sidecar = Sidecar::from_json(&display, &json)?;
    MetadataRecord::from_sidecar(sidecar, formats).map(Some)
}
