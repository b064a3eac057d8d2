//! Service definitions
//!
//! A service is described in YAML and compiled in two stages: the document
//! is deserialised into the `*Spec` types, which are then checked and
//! compiled into an [`Engine`].
//!
//! ```yaml
//! id: wordcount
//! name: Word count
//! command: "wordcount.sh $INPUTDIRECTORY $OUTPUTDIRECTORY $PARAMETERS"
//! parameters:
//!   - name: Options
//!     parameters:
//!       - { id: lowercase, name: Lowercase, type: boolean, flag: -l }
//! profiles:
//!   - inputs:
//!       - { id: text, format: PlainTextFormat, extension: txt }
//!     outputs:
//!       - { id: stats, format: PlainTextFormat, extension: stats }
//!       - if: [{ parameter: lowercase }]
//!         then: { id: lower, format: PlainTextFormat, extension: lower }
//! ```

use crate::engine::Engine;
use crate::profile::Profile;
use serde::{Deserialize, Serialize};
use slotplan_core::{ConfigurationError, EngineConfig, EngineError, FormatSchema, ServiceIdentity};
use slotplan_in::InputTemplateSpec;
use slotplan_out::{OutputTemplate, OutputTemplateSpec};
use slotplan_params::{ParameterGroup, ParameterSet};
use slotplan_policy::{Branch, ConditionSpec};
use tracing::info;

/// One entry of a profile's output list: a template or a condition over
/// further entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputEntrySpec {
    Condition(Box<ConditionSpec<OutputEntrySpec>>),
    Template(Box<OutputTemplateSpec>),
}

impl OutputEntrySpec {
    pub fn compile(self, config: &EngineConfig) -> Result<Branch<OutputTemplate>, ConfigurationError> {
        match self {
            OutputEntrySpec::Template(spec) => Ok(Branch::Leaf((*spec).compile(config)?)),
            OutputEntrySpec::Condition(spec) => {
                let condition = (*spec).compile(|entry: OutputEntrySpec| entry.compile(config))?;
                Ok(Branch::Nested(Box::new(condition)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSpec {
    #[serde(default)]
    pub inputs: Vec<InputTemplateSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputEntrySpec>,
}

impl ProfileSpec {
    pub fn compile(self, config: &EngineConfig) -> Result<Profile, ConfigurationError> {
        let inputs = self
            .inputs
            .into_iter()
            .map(|spec| spec.compile(config))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = self
            .outputs
            .into_iter()
            .map(|entry| entry.compile(config))
            .collect::<Result<Vec<_>, _>>()?;
        Profile::new(inputs, outputs, config)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Command line template for the dispatcher
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_true", alias = "errorlog")]
    pub error_log: bool,
    #[serde(default)]
    pub formats: Vec<FormatSchema>,
    #[serde(default)]
    pub parameters: Vec<ParameterGroup>,
    #[serde(default)]
    pub profiles: Vec<ProfileSpec>,
}

impl ServiceDefinition {
    /// Load a definition from a YAML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_yaml_at(path, &yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        Self::from_yaml_at("<inline>", yaml)
    }

    fn from_yaml_at(path: &str, yaml: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(yaml).map_err(|e| EngineError::parse(path, e))
    }

    /// The engine configuration this definition describes.
    pub fn config(&self) -> EngineConfig {
        let service = ServiceIdentity::new(self.id.as_str(), self.name.as_str()).with_url(self.url.as_str());
        let mut config = EngineConfig::new(service);
        for format in &self.formats {
            config.formats.register(format.clone());
        }
        if !self.error_log {
            config = config.without_error_log();
        }
        config
    }

    pub fn compile(self) -> Result<Engine, ConfigurationError> {
        if self.id.is_empty() {
            return Err(ConfigurationError::Definition("service id is empty".to_string()));
        }
        let config = self.config();
        let parameters = ParameterSet::new(self.parameters)?;
        let profiles = self
            .profiles
            .into_iter()
            .map(|spec| spec.compile(&config))
            .collect::<Result<Vec<_>, _>>()?;
        info!(service = %config.service.id, profiles = profiles.len(), parameters = parameters.len(), "compiled service definition");

        let mut engine = Engine::new(config, parameters, profiles);
        if let Some(command) = self.command {
            engine = engine.with_command(command);
        }
        Ok(engine)
    }
}

/// Load and compile a service definition file.
pub fn load_engine(path: &str) -> Result<Engine, EngineError> {
    Ok(ServiceDefinition::load(path)?.compile()?)
}
