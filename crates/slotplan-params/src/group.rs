//! Named groups of parameter declarations
use crate::declaration::ParameterDeclaration;
use crate::process::{process_parameters, ParameterReport};
use serde::{Deserialize, Serialize};
use slotplan_core::{ConfigurationError, ParameterValues};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGroup {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
}

/// All global parameters of a service, checked for consistency at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    groups: Vec<ParameterGroup>,
}

impl ParameterSet {
    pub fn new(groups: Vec<ParameterGroup>) -> Result<Self, ConfigurationError> {
        let set = Self { groups };
        set.check()?;
        Ok(set)
    }

    fn check(&self) -> Result<(), ConfigurationError> {
        let mut ids = BTreeSet::new();
        for declaration in self.iter() {
            declaration.check()?;
            if !ids.insert(declaration.id.as_str()) {
                return Err(ConfigurationError::InvalidParameter {
                    parameter_id: declaration.id.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
        }
        for declaration in self.iter() {
            let unknown = declaration
                .require
                .iter()
                .chain(&declaration.forbid)
                .find(|id| !ids.contains(id.as_str()));
            if let Some(unknown) = unknown {
                return Err(ConfigurationError::InvalidParameter {
                    parameter_id: declaration.id.clone(),
                    reason: format!("refers to undeclared parameter `{}`", unknown),
                });
            }
        }
        Ok(())
    }

    pub fn groups(&self) -> &[ParameterGroup] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDeclaration> {
        self.groups.iter().flat_map(|g| g.parameters.iter())
    }

    pub fn get(&self, id: &str) -> Option<&ParameterDeclaration> {
        self.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn process(&self, input: &ParameterValues) -> ParameterReport<'_> {
        process_parameters(self.iter(), input)
    }
}
