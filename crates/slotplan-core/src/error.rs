//! Unified error model
//!
//! Three families matter to callers:
//!
//! * [`ConfigurationError`] - raised while a service definition is compiled.
//!   Always fatal, never surfaced per run.
//! * [`ParameterError`] - one per offending parameter, collected into a report.
//! * [`ValidationError`] - a single metadata record failed its checks; scoped
//!   to that one file.
//!
//! [`EngineError`] wraps them together with I/O and parse failures.
use thiserror::Error;

/// Misconfiguration detected while building profiles and templates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("template id `{template_id}` is invalid (ids may not contain `/` or `.`)")]
    InvalidTemplateId { template_id: String },

    #[error("template id `{template_id}` is declared more than once in the same profile")]
    DuplicateTemplateId { template_id: String },

    #[error("format `{format}` is not registered")]
    UnknownFormat { format: String },

    #[error("template `{template_id}` is not unique, so its filename pattern `{filename}` must contain `$SEQNR` or `#`")]
    MissingSequencePlaceholder { template_id: String, filename: String },

    #[error("input template `{template_id}` accepts archives, which requires unique=false")]
    ArchiveRequiresMulti { template_id: String },

    #[error("output template `{template_id}` has no parent and none could be inferred; only unique templates with a fixed filename may be parentless")]
    UnresolvedParent { template_id: String },

    #[error("output template `{template_id}` names parent `{parent}`, which is not an input template of this profile")]
    UnknownParent { template_id: String, parent: String },

    #[error("output templates `{first}` and `{second}` describe identically named output files: {reason}")]
    FilenameCollision {
        first: String,
        second: String,
        reason: String,
    },

    #[error("malformed parameter condition: {reason}")]
    MalformedCondition { reason: String },

    #[error("parameter `{parameter_id}` is misconfigured: {reason}")]
    InvalidParameter { parameter_id: String, reason: String },

    #[error("metadata operation on `{key}` is misconfigured: {reason}")]
    InvalidMetaOp { key: String, reason: String },

    #[error("service definition is invalid: {0}")]
    Definition(String),
}

/// A single parameter that failed validation or a require/forbid relation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parameter `{parameter_id}`: {message}")]
pub struct ParameterError {
    pub parameter_id: String,
    pub message: String,
}

impl ParameterError {
    pub fn new(parameter_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            parameter_id: parameter_id.into(),
            message: message.into(),
        }
    }
}

/// A metadata record that failed format or constraint validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("metadata for `{filename}` is invalid: {reason}")]
pub struct ValidationError {
    pub filename: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("CONFIG/{0}")]
    Configuration(#[from] ConfigurationError),

    #[error("PARAM/{} parameter error(s): {}", .0.len(), summarize(.0))]
    Parameters(Vec<ParameterError>),

    #[error("VALID/{0}")]
    Validation(#[from] ValidationError),

    #[error("IO/{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PARSE/{path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("SERIALIZE/{0}")]
    Serialize(String),
}

impl EngineError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

fn summarize(errors: &[ParameterError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
