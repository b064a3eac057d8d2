//! Resolution engine
//!
//! Folds the outputs of every matching profile into one [`Program`]. Profiles
//! that do not match contribute nothing; rejected candidates are reported
//! next to the program without affecting their siblings.

use crate::profile::{Profile, ProfileMatch, RunContext};
use crate::program::Program;
use slotplan_core::{EngineConfig, EngineError, ParameterValues, ValidationError};
use slotplan_in::LinkSet;
use slotplan_meta::MetadataRecord;
use slotplan_params::{ParameterReport, ParameterSet};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Everything one resolution produced.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub program: Program,
    /// Validated metadata of every planned output, by filename
    pub records: BTreeMap<String, MetadataRecord>,
    pub rejected: Vec<ValidationError>,
    /// Match outcome of each profile, by index
    pub matches: Vec<ProfileMatch>,
    /// Arguments for `$PARAMETERS`
    pub command_line: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    parameters: ParameterSet,
    profiles: Vec<Profile>,
    command: Option<String>,
}

impl Engine {
    pub fn new(config: EngineConfig, parameters: ParameterSet, profiles: Vec<Profile>) -> Self {
        Self {
            config,
            parameters,
            profiles,
            command: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Command line template handed to the dispatcher.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn process_parameters(&self, raw: &ParameterValues) -> ParameterReport<'_> {
        self.parameters.process(raw)
    }

    /// Resolve the program for already validated parameter values.
    pub fn resolve(&self, links: &LinkSet, parameters: &ParameterValues, project: &str) -> Resolution {
        let run = RunContext {
            links,
            parameters,
            config: &self.config,
            project,
        };
        let mut resolution = Resolution::default();

        for (index, profile) in self.profiles.iter().enumerate() {
            let matched = profile.match_files(links, parameters);
            if !matched.matched {
                debug!(
                    profile = index,
                    mandatory_absent = ?matched.mandatory_absent,
                    "profile does not match"
                );
                resolution.matches.push(matched);
                continue;
            }
            info!(profile = index, optional_absent = ?matched.optional_absent, "profile matches");

            resolution.program.record_profile(index);
            for result in profile.generate(&run, &matched) {
                match result {
                    Ok(output) => {
                        resolution
                            .program
                            .add(output.filename.clone(), output.template, output.inputs);
                        resolution.records.entry(output.filename).or_insert(output.metadata);
                    }
                    Err(rejected) => resolution.rejected.push(rejected),
                }
            }
            resolution.matches.push(matched);
        }

        if resolution.program.matched_profiles().is_empty() {
            warn!(project, "no profile matches the linked input files");
        }
        resolution
    }

    /// Validate raw parameter input and resolve; parameter errors abort.
    pub fn start(&self, links: &LinkSet, raw: &ParameterValues, project: &str) -> Result<Resolution, EngineError> {
        let report = self.process_parameters(raw);
        for error in report.errors() {
            warn!(parameter = %error.parameter_id, message = %error.message, "parameter error");
        }
        let command_line = report.command_line.clone();
        let values = report.into_values()?;
        let mut resolution = self.resolve(links, &values, project);
        resolution.command_line = command_line;
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotplan_core::{builtin_formats, Operator};
    use slotplan_in::InputTemplate;
    use slotplan_out::OutputTemplate;
    use slotplan_params::{ParameterDeclaration, ParameterGroup};
    use slotplan_policy::{Branch, Comparison, ParameterCondition};

    fn engine() -> Engine {
        let config = EngineConfig::default();
        let text = builtin_formats()["PlainTextFormat"].clone();
        let summary = ParameterCondition::new(
            vec![Comparison::new("summary", Operator::Equals, true)],
            Branch::Leaf(
                OutputTemplate::new("summaryfile", text.clone()).with_filename("summary.txt"),
            ),
        )
        .unwrap();
        let profile = Profile::new(
            vec![InputTemplate::new("text", text.clone()).with_extension("txt")],
            vec![
                Branch::Leaf(OutputTemplate::new("stats", text).with_extension("stats")),
                Branch::Nested(Box::new(summary)),
            ],
            &config,
        )
        .unwrap();
        let parameters = ParameterSet::new(vec![ParameterGroup {
            name: "Options".into(),
            parameters: vec![ParameterDeclaration::boolean("summary", "Summary").with_flag("-s")],
        }])
        .unwrap();
        Engine::new(config, parameters, vec![profile])
    }

    #[test]
    fn test_resolve_single_profile() {
        let links = LinkSet::new().with_link("doc.txt", "text", 0);
        let resolution = engine().resolve(&links, &ParameterValues::new(), "p");

        assert_eq!(resolution.program.matched_profiles(), &[0]);
        assert_eq!(resolution.program.input_pairs("doc.stats"), vec![("doc.txt", "text")]);
        assert!(resolution.program.contains("error.log"));
        assert!(!resolution.program.contains("summary.txt"));
        assert_eq!(resolution.records.len(), 2);
        assert!(resolution.rejected.is_empty());
    }

    #[test]
    fn test_start_with_parameters() {
        let links = LinkSet::new().with_link("doc.txt", "text", 0);
        let raw = ParameterValues::new().with("summary", "yes");
        let resolution = engine().start(&links, &raw, "p").unwrap();

        assert!(resolution.program.contains("summary.txt"));
        assert_eq!(resolution.command_line, vec!["-s".to_string()]);
    }

    #[test]
    fn test_unmatched_profile_contributes_nothing() {
        let resolution = engine().resolve(&LinkSet::new(), &ParameterValues::new(), "p");
        assert!(resolution.program.is_empty());
        assert!(resolution.program.matched_profiles().is_empty());
        assert_eq!(resolution.matches[0].mandatory_absent, vec!["text".to_string()]);
    }
}
