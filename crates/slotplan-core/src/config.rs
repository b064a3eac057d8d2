//! Engine configuration: service identity and the format registry
//!
//! Built once when a service definition is loaded and handed by reference to
//! every template constructor and to the resolution engine.
use crate::error::ConfigurationError;
use crate::format::{FormatRegistry, FormatSchema};
use serde::{Deserialize, Serialize};

/// Identity of the service that generates outputs, recorded in provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl ServiceIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: String::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub service: ServiceIdentity,
    pub formats: FormatRegistry,
    /// Append the synthetic error log output to every profile lacking one
    pub error_log: bool,
}

impl EngineConfig {
    pub fn new(service: ServiceIdentity) -> Self {
        Self {
            service,
            formats: FormatRegistry::new(),
            error_log: true,
        }
    }

    pub fn with_format(mut self, schema: FormatSchema) -> Self {
        self.formats.register(schema);
        self
    }

    pub fn without_error_log(mut self) -> Self {
        self.error_log = false;
        self
    }

    pub fn format(&self, id: &str) -> Result<FormatSchema, ConfigurationError> {
        self.formats.resolve(id)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(ServiceIdentity::new("slotplan", "slotplan"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new(ServiceIdentity::new("frog", "Frog").with_url("http://localhost/frog"))
            .with_format(FormatSchema::new("TokenisedFormat", "Tokenised text", "text/plain"))
            .without_error_log();

        assert_eq!(config.service.url, "http://localhost/frog");
        assert!(!config.error_log);
        assert!(config.format("TokenisedFormat").is_ok());
        assert!(config.format("PlainTextFormat").is_ok());
        assert!(config.format("MissingFormat").is_err());
    }
}
