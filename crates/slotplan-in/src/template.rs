//! Input templates
//!
//! An input template is one accepted input slot of a profile. Unique
//! templates take exactly one file; others take any number, distinguished by
//! sequence number.

use crate::links::LinkSet;
use serde::{Deserialize, Serialize};
use slotplan_core::{validate_template_id, ConfigurationError, EngineConfig, FormatSchema};
use slotplan_params::ParameterDeclaration;
use slotplan_policy::Constraint;

#[derive(Debug, Clone, PartialEq)]
pub struct InputTemplate {
    pub id: String,
    pub label: String,
    pub format: FormatSchema,
    pub unique: bool,
    /// Fixed filename pattern the upload is stored under
    pub filename: Option<String>,
    /// Extension the stored filename must end with
    pub extension: Option<String>,
    pub accept_archive: bool,
    pub optional: bool,
    pub parameters: Vec<ParameterDeclaration>,
    pub constraints: Vec<Constraint>,
}

impl InputTemplate {
    pub fn new(id: impl Into<String>, format: FormatSchema) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            format,
            unique: true,
            filename: None,
            extension: None,
            accept_archive: false,
            optional: false,
            parameters: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn multi(mut self) -> Self {
        self.unique = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn accepting_archives(mut self) -> Self {
        self.accept_archive = true;
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDeclaration) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Check the template invariants, handing the template back when they hold.
    pub fn validated(self) -> Result<Self, ConfigurationError> {
        validate_template_id(&self.id)?;
        if let Some(filename) = &self.filename {
            if !self.unique && !filename.contains("$SEQNR") && !filename.contains('#') {
                return Err(ConfigurationError::MissingSequencePlaceholder {
                    template_id: self.id.clone(),
                    filename: filename.clone(),
                });
            }
        }
        if self.accept_archive && self.unique {
            return Err(ConfigurationError::ArchiveRequiresMulti {
                template_id: self.id.clone(),
            });
        }
        for parameter in &self.parameters {
            parameter.check()?;
        }
        Ok(self)
    }

    /// `(sequence, filename)` pairs linked to this template, ordered by
    /// sequence. A unique template with anything but exactly one linked file
    /// yields nothing.
    pub fn matching_files(&self, links: &LinkSet) -> Vec<(u64, String)> {
        let found = links.matching(&self.id);
        if self.unique && found.len() != 1 {
            return Vec::new();
        }
        found
    }
}

fn default_true() -> bool {
    true
}

/// Input template as written in a service definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTemplateSpec {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub format: String,
    #[serde(default = "default_true")]
    pub unique: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default, alias = "acceptarchive")]
    pub accept_archive: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl InputTemplateSpec {
    pub fn compile(self, config: &EngineConfig) -> Result<InputTemplate, ConfigurationError> {
        let format = config.format(&self.format)?;
        let mut template = InputTemplate::new(self.id, format);
        if let Some(label) = self.label {
            template.label = label;
        }
        template.unique = self.unique;
        template.filename = self.filename;
        template.extension = self.extension;
        template.accept_archive = self.accept_archive;
        template.optional = self.optional;
        template.parameters = self.parameters;
        template.constraints = self.constraints;
        template.validated()
    }
}
