//! Profiles
//!
//! A profile pairs the inputs a service accepts with the outputs they
//! produce. Construction resolves every output's parent input and rejects
//! ambiguous layouts; matching decides whether a run's files satisfy the
//! profile; generation yields the concrete outputs.

use slotplan_core::{ConfigurationError, EngineConfig, ParameterValues, ValidationError};
use slotplan_in::{InputTemplate, LinkSet};
use slotplan_out::{GeneratedOutput, GenerationContext, OutputTemplate};
use slotplan_policy::Branch;
use std::collections::BTreeSet;
use tracing::debug;

pub const ERROR_LOG_ID: &str = "errorlog";
pub const ERROR_LOG_FILENAME: &str = "error.log";

/// The output every profile carries for the wrapped tool's error log.
pub fn error_log_template(config: &EngineConfig) -> Result<OutputTemplate, ConfigurationError> {
    let format = config.format("PlainTextFormat")?;
    Ok(OutputTemplate::new(ERROR_LOG_ID, format)
        .with_label("Error log")
        .with_filename(ERROR_LOG_FILENAME))
}

/// Outcome of matching a profile against the files of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileMatch {
    pub matched: bool,
    /// Ids of required input templates without files
    pub mandatory_absent: Vec<String>,
    /// Ids of optional input templates without files
    pub optional_absent: Vec<String>,
}

/// The run-specific state generation reads.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub links: &'a LinkSet,
    pub parameters: &'a ParameterValues,
    pub config: &'a EngineConfig,
    pub project: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    inputs: Vec<InputTemplate>,
    outputs: Vec<Branch<OutputTemplate>>,
}

impl Profile {
    pub fn new(
        inputs: Vec<InputTemplate>,
        outputs: Vec<Branch<OutputTemplate>>,
        config: &EngineConfig,
    ) -> Result<Self, ConfigurationError> {
        let inputs = inputs
            .into_iter()
            .map(InputTemplate::validated)
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = BTreeSet::new();
        for input in &inputs {
            if !seen.insert(input.id.as_str()) {
                return Err(ConfigurationError::DuplicateTemplateId {
                    template_id: input.id.clone(),
                });
            }
        }

        let mut resolve = |template: OutputTemplate| resolve_parent(template, &inputs);
        let mut outputs = outputs
            .into_iter()
            .map(|branch| branch.try_map(&mut resolve))
            .collect::<Result<Vec<_>, _>>()?;

        check_collisions(&outputs)?;

        let has_error_log = outputs
            .iter()
            .flat_map(Branch::leaves)
            .any(|o| o.filename.as_deref() == Some(ERROR_LOG_FILENAME));
        if config.error_log && !has_error_log {
            outputs.push(Branch::Leaf(error_log_template(config)?));
        }

        Ok(Self { inputs, outputs })
    }

    pub fn inputs(&self) -> &[InputTemplate] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Branch<OutputTemplate>] {
        &self.outputs
    }

    pub fn input(&self, id: &str) -> Option<&InputTemplate> {
        self.inputs.iter().find(|t| t.id == id)
    }

    /// Every output template reachable through any condition branch.
    pub fn output_templates(&self) -> Vec<&OutputTemplate> {
        self.outputs.iter().flat_map(Branch::leaves).collect()
    }

    /// Output templates selected by `parameters`, in declared order.
    pub fn active_outputs<'p>(&'p self, parameters: &ParameterValues) -> Vec<&'p OutputTemplate> {
        self.outputs
            .iter()
            .filter_map(|branch| branch.evaluate(parameters))
            .collect()
    }

    /// Check whether the linked files satisfy this profile.
    ///
    /// Every required input template needs files. The profile must also
    /// produce some output: an active output that has no parent, or whose
    /// parent is not an absent optional input. The error log output is
    /// parentless, so in practice the second check always passes when it is
    /// present.
    pub fn match_files(&self, links: &LinkSet, parameters: &ParameterValues) -> ProfileMatch {
        let mut result = ProfileMatch::default();
        for input in &self.inputs {
            if input.matching_files(links).is_empty() {
                if input.optional {
                    result.optional_absent.push(input.id.clone());
                } else {
                    result.mandatory_absent.push(input.id.clone());
                }
            }
        }
        if !result.mandatory_absent.is_empty() {
            return result;
        }

        result.matched = self.active_outputs(parameters).into_iter().any(|output| match &output.parent {
            None => true,
            Some(parent) => !result.optional_absent.contains(parent),
        });
        result
    }

    /// Generate the outputs of a matched profile.
    ///
    /// Outputs whose parent is an absent optional input are skipped.
    pub fn generate(
        &self,
        run: &RunContext<'_>,
        matched: &ProfileMatch,
    ) -> Vec<Result<GeneratedOutput, ValidationError>> {
        let ctx = GenerationContext {
            inputs: &self.inputs,
            links: run.links,
            parameters: run.parameters,
            config: run.config,
            project: run.project,
        };
        let mut results = Vec::new();
        for output in self.active_outputs(run.parameters) {
            if let Some(parent) = &output.parent {
                if matched.optional_absent.contains(parent) {
                    debug!(template = %output.id, parent = %parent, "skipping output of absent optional input");
                    continue;
                }
            }
            results.extend(output.generate(&ctx));
        }
        results
    }
}

/// Fill in or verify the parent of one output template.
///
/// Without an explicit parent, the first input with the same uniqueness is
/// taken.
fn resolve_parent(template: OutputTemplate, inputs: &[InputTemplate]) -> Result<OutputTemplate, ConfigurationError> {
    let mut template = template.validated()?;
    match &template.parent {
        Some(parent) => {
            if !inputs.iter().any(|i| &i.id == parent) {
                return Err(ConfigurationError::UnknownParent {
                    template_id: template.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
        None => {
            template.parent = inputs
                .iter()
                .find(|i| i.unique == template.unique)
                .map(|i| i.id.clone());
            if template.parent.is_none() && !template.is_standalone() {
                return Err(ConfigurationError::UnresolvedParent {
                    template_id: template.id.clone(),
                });
            }
        }
    }
    Ok(template)
}

/// Reject unconditional outputs that would produce identically named files.
fn check_collisions(outputs: &[Branch<OutputTemplate>]) -> Result<(), ConfigurationError> {
    let direct: Vec<&OutputTemplate> = outputs
        .iter()
        .filter_map(|branch| match branch {
            Branch::Leaf(template) => Some(template),
            Branch::Nested(_) => None,
        })
        .collect();

    for (i, first) in direct.iter().enumerate() {
        for second in &direct[i + 1..] {
            if first.id == second.id {
                return Err(ConfigurationError::DuplicateTemplateId {
                    template_id: first.id.clone(),
                });
            }
            if first.filename != second.filename {
                continue;
            }
            let reason = match &first.filename {
                Some(filename) => format!("both use the filename `{}`", filename),
                None if first.extension == second.extension && first.parent == second.parent => {
                    "both inherit their name from the same parent without a distinguishing extension".to_string()
                }
                None => continue,
            };
            return Err(ConfigurationError::FilenameCollision {
                first: first.id.clone(),
                second: second.id.clone(),
                reason,
            });
        }
    }
    Ok(())
}
