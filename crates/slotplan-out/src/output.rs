//! Output templates and output generation
//!
//! An output template describes one category of produced file. Generation
//! walks the files matched by the template's parent input, derives a name and
//! a metadata record for each, and validates the record. A failed record only
//! rejects that one candidate.

use crate::metaop::{apply_metafields, MetaContext, MetaFieldSpec, MetaOp, RelevantInput};
use serde::{Deserialize, Serialize};
use slotplan_core::{
    escapes_directory, resolve_filename, validate_template_id, ConfigurationError, EngineConfig, FormatSchema,
    NamingContext, ParameterValues, ValidationError, Value, VALIDATION_ERROR_KEY,
};
use slotplan_in::{InputTemplate, LinkSet};
use slotplan_meta::{MetadataRecord, Provenance};
use slotplan_policy::{Branch, Constraint};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Which extensions to drop from an inherited input filename.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RemoveExtensions {
    /// Strip the parent's declared extension (or the last one) when a new
    /// extension is appended.
    #[default]
    Replace,
    /// Cut the name at its first dot.
    All,
    List(Vec<String>),
}

impl RemoveExtensions {
    fn apply(&self, filename: &str, parent: &InputTemplate, appending: bool) -> String {
        match self {
            RemoveExtensions::All => match filename.split_once('.') {
                Some((stem, _)) => stem.to_string(),
                None => filename.to_string(),
            },
            RemoveExtensions::List(extensions) => {
                let mut name = filename.to_string();
                for extension in extensions.iter().filter(|e| !e.is_empty()) {
                    let suffix = if extension.starts_with('.') {
                        extension.clone()
                    } else {
                        format!(".{}", extension)
                    };
                    if let Some(stripped) = name.strip_suffix(&suffix) {
                        name = stripped.to_string();
                    }
                }
                name
            }
            RemoveExtensions::Replace if appending => {
                let declared = parent.extension.as_deref().map(|e| format!(".{}", e.trim_start_matches('.')));
                if let Some(stripped) = declared.as_deref().and_then(|d| filename.strip_suffix(d)) {
                    if !stripped.is_empty() {
                        return stripped.to_string();
                    }
                }
                match filename.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() && !stem.ends_with('/') => stem.to_string(),
                    _ => filename.to_string(),
                }
            }
            RemoveExtensions::Replace => filename.to_string(),
        }
    }
}

/// One generated output candidate that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedOutput {
    pub filename: String,
    pub template: String,
    pub sequence: u64,
    pub metadata: MetadataRecord,
    /// Contributing input filename → input template id
    pub inputs: BTreeMap<String, String>,
}

/// Everything generation reads about the current run.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    /// Input templates of the owning profile, in declared order
    pub inputs: &'a [InputTemplate],
    pub links: &'a LinkSet,
    pub parameters: &'a ParameterValues,
    pub config: &'a EngineConfig,
    pub project: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputTemplate {
    pub id: String,
    pub label: String,
    pub format: FormatSchema,
    pub unique: bool,
    pub filename: Option<String>,
    pub extension: Option<String>,
    /// Input template id the output derives from
    pub parent: Option<String>,
    pub copy_metadata: bool,
    pub remove_extensions: RemoveExtensions,
    pub metafields: Vec<Branch<MetaOp>>,
    pub constraints: Vec<Constraint>,
}

impl OutputTemplate {
    pub fn new(id: impl Into<String>, format: FormatSchema) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            format,
            unique: true,
            filename: None,
            extension: None,
            parent: None,
            copy_metadata: false,
            remove_extensions: RemoveExtensions::default(),
            metafields: Vec::new(),
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

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into().trim_start_matches('.').to_string());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn copying_metadata(mut self) -> Self {
        self.copy_metadata = true;
        self
    }

    pub fn removing_extensions(mut self, remove: RemoveExtensions) -> Self {
        self.remove_extensions = remove;
        self
    }

    pub fn with_metafield(mut self, op: MetaOp) -> Self {
        self.metafields.push(Branch::Leaf(op));
        self
    }

    pub fn with_metafield_branch(mut self, branch: Branch<MetaOp>) -> Self {
        self.metafields.push(branch);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Parentless outputs are only allowed when unique with a fixed filename.
    pub fn is_standalone(&self) -> bool {
        self.unique && self.filename.is_some()
    }

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
        Ok(self)
    }

    /// Name of the output derived from `input_filename` before variables are
    /// resolved.
    fn inherited_name(&self, input_filename: &str, parent: &InputTemplate) -> String {
        let appending = self.extension.is_some();
        let mut filename = self.remove_extensions.apply(input_filename, parent, appending);
        if let Some(extension) = &self.extension {
            let suffix = format!(".{}", extension);
            if !filename.ends_with(&suffix) {
                filename.push_str(&suffix);
            }
        }
        filename
    }

    /// Generate every output this template yields for the run in `ctx`.
    ///
    /// Each entry is either a validated output or the reason one candidate
    /// was rejected.
    pub fn generate(&self, ctx: &GenerationContext<'_>) -> Vec<Result<GeneratedOutput, ValidationError>> {
        let parent = match &self.parent {
            Some(parent_id) => match ctx.inputs.iter().find(|t| &t.id == parent_id) {
                Some(parent) => parent,
                None => {
                    warn!(template = %self.id, parent = %parent_id, "parent input template is not part of the profile");
                    return Vec::new();
                }
            },
            None if self.is_standalone() => return vec![self.generate_standalone(ctx)],
            None => {
                warn!(template = %self.id, "output template has neither parent nor fixed filename");
                return Vec::new();
            }
        };

        let matched: Vec<(&InputTemplate, Vec<(u64, String)>)> = ctx
            .inputs
            .iter()
            .map(|t| (t, t.matching_files(ctx.links)))
            .collect();

        let mut results = Vec::new();
        for (sequence, input_filename) in parent.matching_files(ctx.links) {
            let mut relevant = Vec::new();
            for (template, files) in &matched {
                for (seq, filename) in files {
                    if template.unique || *seq == sequence {
                        relevant.push(RelevantInput {
                            template: template.id.as_str(),
                            filename: filename.as_str(),
                            metadata: ctx.links.metadata(filename),
                        });
                    }
                }
            }

            let seed = if self.copy_metadata {
                ctx.links.metadata(&input_filename).map(|m| m.attributes().clone())
            } else {
                None
            };
            let pattern = match &self.filename {
                Some(filename) => filename.clone(),
                None => self.inherited_name(&input_filename, parent),
            };
            let mut result = self.build(ctx, seed, &relevant, &pattern, sequence, Some(input_filename.as_str()));
            if let Ok(output) = &mut result {
                output.inputs.insert(input_filename.clone(), parent.id.clone());
            }
            results.push(result);
        }
        results
    }

    fn generate_standalone(&self, ctx: &GenerationContext<'_>) -> Result<GeneratedOutput, ValidationError> {
        let pattern = self.filename.clone().unwrap_or_default();
        self.build(ctx, None, &[], &pattern, 0, None)
    }

    fn build(
        &self,
        ctx: &GenerationContext<'_>,
        seed: Option<BTreeMap<String, Value>>,
        relevant: &[RelevantInput<'_>],
        pattern: &str,
        sequence: u64,
        input_filename: Option<&str>,
    ) -> Result<GeneratedOutput, ValidationError> {
        let mut attributes = seed.unwrap_or_default();
        attributes.remove(VALIDATION_ERROR_KEY);
        let meta_ctx = MetaContext {
            parameters: ctx.parameters,
            inputs: relevant,
        };
        apply_metafields(&self.metafields, &mut attributes, &meta_ctx);

        let mut provenance = Provenance::new(&ctx.config.service, &self.id, &self.label)
            .with_parameters(ctx.parameters.clone());
        for input in relevant {
            let sidecar = match input.metadata {
                Some(record) => record.to_sidecar(),
                None => {
                    let format = ctx
                        .inputs
                        .iter()
                        .find(|t| t.id == input.template)
                        .map(|t| t.format.clone())
                        .unwrap_or_else(|| self.format.clone());
                    MetadataRecord::new(format).with_input_template(input.template).to_sidecar()
                }
            };
            provenance = provenance.with_input(input.filename, sidecar);
        }

        let metadata = MetadataRecord::new(self.format.clone())
            .with_attributes(attributes)
            .with_provenance(provenance)
            .with_constraints(self.constraints.clone());

        let mut naming = NamingContext::new(ctx.parameters)
            .with_attributes(metadata.attributes())
            .with_project(ctx.project)
            .with_sequence(sequence, self.unique);
        if let Some(input) = input_filename {
            naming = naming.with_input_filename(input);
        }
        let filename = resolve_filename(pattern, &naming);
        if escapes_directory(&filename) {
            warn!(template = %self.id, filename = %filename, "output filename leaves the output directory");
            return Err(ValidationError::new(
                filename,
                "output filename must be relative and may not contain `..`",
            ));
        }

        let metadata = match metadata.into_validated(&filename) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(template = %self.id, filename = %filename, reason = %err.reason, "output rejected");
                return Err(err);
            }
        };
        debug!(template = %self.id, filename = %filename, sequence, "determined output filename");
        Ok(GeneratedOutput {
            filename,
            template: self.id.clone(),
            sequence,
            metadata,
            inputs: BTreeMap::new(),
        })
    }
}

/// `remove_extensions: true` or a list of extensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoveExtensionsSpec {
    All(bool),
    List(Vec<String>),
}

fn default_true() -> bool {
    true
}

/// Output template as written in a service definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTemplateSpec {
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
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, alias = "copymetadata")]
    pub copy_metadata: bool,
    #[serde(default, alias = "removeextensions")]
    pub remove_extensions: Option<RemoveExtensionsSpec>,
    #[serde(default)]
    pub metafields: Vec<MetaFieldSpec>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl OutputTemplateSpec {
    pub fn compile(self, config: &EngineConfig) -> Result<OutputTemplate, ConfigurationError> {
        let format = config.format(&self.format)?;
        let mut template = OutputTemplate::new(self.id, format);
        if let Some(label) = self.label {
            template.label = label;
        }
        template.unique = self.unique;
        template.filename = self.filename;
        if let Some(extension) = self.extension {
            template = template.with_extension(extension);
        }
        template.parent = self.parent;
        template.copy_metadata = self.copy_metadata;
        template.remove_extensions = match self.remove_extensions {
            None | Some(RemoveExtensionsSpec::All(false)) => RemoveExtensions::Replace,
            Some(RemoveExtensionsSpec::All(true)) => RemoveExtensions::All,
            Some(RemoveExtensionsSpec::List(list)) => RemoveExtensions::List(list),
        };
        template.metafields = self
            .metafields
            .into_iter()
            .map(MetaFieldSpec::compile)
            .collect::<Result<_, _>>()?;
        template.constraints = self.constraints;
        template.validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotplan_core::{builtin_formats, AttributeRule, Operator};
    use slotplan_policy::AttributeTest;

    fn plaintext() -> FormatSchema {
        builtin_formats()["PlainTextFormat"].clone()
    }

    fn run<'a>(
        inputs: &'a [InputTemplate],
        links: &'a LinkSet,
        parameters: &'a ParameterValues,
        config: &'a EngineConfig,
    ) -> GenerationContext<'a> {
        GenerationContext {
            inputs,
            links,
            parameters,
            config,
            project: "proj",
        }
    }

    #[test]
    fn test_extension_replaces_parent_extension() {
        let inputs = [InputTemplate::new("text", plaintext()).with_extension("txt")];
        let links = LinkSet::new().with_link("doc.txt", "text", 0);
        let params = ParameterValues::new();
        let config = EngineConfig::default();
        let stats = OutputTemplate::new("stats", plaintext())
            .with_parent("text")
            .with_extension("stats");

        let outputs = stats.generate(&run(&inputs, &links, &params, &config));
        assert_eq!(outputs.len(), 1);
        let output = outputs[0].as_ref().unwrap();
        assert_eq!(output.filename, "doc.stats");
        assert_eq!(output.inputs.get("doc.txt").map(String::as_str), Some("text"));
        let provenance = output.metadata.provenance().unwrap();
        assert_eq!(provenance.outputtemplate, "stats");
        assert_eq!(provenance.inputfiles.len(), 1);
        assert_eq!(provenance.inputfiles[0].metadata.inputtemplate.as_deref(), Some("text"));
    }

    #[test]
    fn test_filename_leaving_output_dir_rejected() {
        let links = LinkSet::new();
        let config = EngineConfig::default();
        let report = OutputTemplate::new("report", plaintext()).with_filename("$name.txt");

        for name in ["../../escaped", "/tmp/escaped", "sub/../../escaped"] {
            let params = ParameterValues::new().with("name", name);
            let outputs = report.generate(&run(&[], &links, &params, &config));
            assert_eq!(outputs.len(), 1);
            let err = outputs[0].as_ref().unwrap_err();
            assert_eq!(err.filename, format!("{}.txt", name));
        }

        let params = ParameterValues::new().with("name", "sub/report");
        let outputs = report.generate(&run(&[], &links, &params, &config));
        assert_eq!(outputs[0].as_ref().unwrap().filename, "sub/report.txt");
    }

    #[test]
    fn test_remove_extensions() {
        let parent = InputTemplate::new("text", plaintext());
        let all = OutputTemplate::new("o", plaintext())
            .with_extension("xml")
            .removing_extensions(RemoveExtensions::All);
        assert_eq!(all.inherited_name("doc.tok.txt", &parent), "doc.xml");

        let listed = OutputTemplate::new("o", plaintext())
            .with_extension("xml")
            .removing_extensions(RemoveExtensions::List(vec!["txt".into(), ".tok".into()]));
        assert_eq!(listed.inherited_name("doc.tok.txt", &parent), "doc.xml");

        let plain = OutputTemplate::new("o", plaintext());
        assert_eq!(plain.inherited_name("doc.txt", &parent), "doc.txt");

        let already = OutputTemplate::new("o", plaintext()).with_extension("txt");
        assert_eq!(already.inherited_name("notes", &parent), "notes.txt");
    }

    #[test]
    fn test_sequence_numbered_outputs() {
        let inputs = [InputTemplate::new("images", builtin_formats()["PngImageFormat"].clone()).multi()];
        let links = LinkSet::new()
            .with_link("b.png", "images", 2)
            .with_link("a.png", "images", 1)
            .with_link("c.png", "images", 3);
        let params = ParameterValues::new();
        let config = EngineConfig::default();
        let thumb = OutputTemplate::new("thumb", builtin_formats()["PngImageFormat"].clone())
            .multi()
            .with_parent("images")
            .with_filename("thumb_$SEQNR.png");

        let names: Vec<String> = thumb
            .generate(&run(&inputs, &links, &params, &config))
            .into_iter()
            .map(|r| r.unwrap().filename)
            .collect();
        assert_eq!(names, vec!["thumb_1.png", "thumb_2.png", "thumb_3.png"]);
    }

    #[test]
    fn test_relevant_inputs_share_sequence() {
        let inputs = [
            InputTemplate::new("lexicon", plaintext()),
            InputTemplate::new("pages", plaintext()).multi(),
        ];
        let links = LinkSet::new()
            .with_link("lexicon.txt", "lexicon", 0)
            .with_link("p1.txt", "pages", 1)
            .with_link("p2.txt", "pages", 2);
        let params = ParameterValues::new();
        let config = EngineConfig::default();
        let out = OutputTemplate::new("tagged", plaintext())
            .multi()
            .with_parent("pages")
            .with_extension("tagged");

        let outputs = out.generate(&run(&inputs, &links, &params, &config));
        let second = outputs[1].as_ref().unwrap();
        assert_eq!(second.filename, "p2.tagged");
        let used: Vec<&str> = second
            .metadata
            .provenance()
            .unwrap()
            .inputfiles
            .iter()
            .map(|i| i.filename.as_str())
            .collect();
        assert_eq!(used, vec!["lexicon.txt", "p2.txt"]);
    }

    #[test]
    fn test_copy_metadata_and_metafields() {
        let inputs = [InputTemplate::new("text", plaintext())];
        let parent_record = MetadataRecord::new(plaintext())
            .with_attribute("encoding", "latin1")
            .with_attribute("language", "nl")
            .with_attribute(VALIDATION_ERROR_KEY, "stale");
        let links = LinkSet::new()
            .with_link("doc.txt", "text", 0)
            .with_metadata("doc.txt", parent_record);
        let params = ParameterValues::new().with("author", "jo");
        let config = EngineConfig::default();
        let out = OutputTemplate::new("tok", plaintext())
            .with_parent("text")
            .with_filename("$language-$author.tok")
            .copying_metadata()
            .with_metafield(MetaOp::set("encoding", "utf-8"))
            .with_metafield(MetaOp::from_parameter("author", "author"));

        let output = out.generate(&run(&inputs, &links, &params, &config)).remove(0).unwrap();
        assert_eq!(output.filename, "nl-jo.tok");
        assert_eq!(output.metadata.get("encoding"), Some(&Value::text("utf-8")));
        assert!(output.metadata.get(VALIDATION_ERROR_KEY).is_none());
    }

    #[test]
    fn test_invalid_candidate_is_rejected_alone() {
        let inputs = [InputTemplate::new("pages", plaintext()).multi()];
        let links = LinkSet::new()
            .with_link("p1.txt", "pages", 1)
            .with_link("p2.txt", "pages", 2)
            .with_metadata("p1.txt", MetadataRecord::new(plaintext()).with_attribute("language", "en"))
            .with_metadata("p2.txt", MetadataRecord::new(plaintext()).with_attribute("language", "fr"));
        let params = ParameterValues::new();
        let config = EngineConfig::default();
        let out = OutputTemplate::new("english", plaintext())
            .multi()
            .with_parent("pages")
            .with_extension("en")
            .copying_metadata()
            .with_constraint(Constraint::require(vec![AttributeTest::new(
                "language",
                Operator::Equals,
                "en",
            )]));

        let outputs = out.generate(&run(&inputs, &links, &params, &config));
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].as_ref().unwrap().filename, "p1.en");
        let rejected = outputs[1].as_ref().unwrap_err();
        assert_eq!(rejected.filename, "p2.en");
    }

    #[test]
    fn test_standalone_output() {
        let strict = FormatSchema::new("LogFormat", "Log", "text/plain").with_attribute("level", AttributeRule::open());
        let out = OutputTemplate::new("summary", strict).with_filename("$PROJECT-summary.txt");
        let params = ParameterValues::new();
        let config = EngineConfig::default();
        let links = LinkSet::new();

        let outputs = out.generate(&run(&[], &links, &params, &config));
        assert_eq!(outputs.len(), 1);
        let output = outputs[0].as_ref().unwrap();
        assert_eq!(output.filename, "proj-summary.txt");
        assert_eq!(output.sequence, 0);
        assert!(output.inputs.is_empty());
    }

    #[test]
    fn test_multi_filename_needs_placeholder() {
        let bad = OutputTemplate::new("pages", plaintext()).multi().with_filename("page.txt");
        assert!(matches!(
            bad.validated(),
            Err(ConfigurationError::MissingSequencePlaceholder { .. })
        ));
    }

    #[test]
    fn test_compile_spec() {
        let yaml = r#"
id: tokenised
label: Tokenised text
format: PlainTextFormat
parent: text
extension: .tok
removeextensions: [txt]
copymetadata: true
metafields:
  - { op: copy, key: language, from: text }
  - { op: set, key: tokenised, value: true }
"#;
        let spec: OutputTemplateSpec = serde_yaml::from_str(yaml).unwrap();
        let template = spec.compile(&EngineConfig::default()).unwrap();
        assert_eq!(template.extension.as_deref(), Some("tok"));
        assert_eq!(template.remove_extensions, RemoveExtensions::List(vec!["txt".to_string()]));
        assert_eq!(template.metafields.len(), 2);
        assert!(template.copy_metadata);

        let bad: OutputTemplateSpec =
            serde_yaml::from_str("id: x\nformat: PlainTextFormat\nmetafields:\n  - { op: copy, key: a, from: b.c.d }\n")
                .unwrap();
        assert!(matches!(
            bad.compile(&EngineConfig::default()),
            Err(ConfigurationError::InvalidMetaOp { .. })
        ));
    }
}
