//! Aggregate parameter processing for one run
//!
//! Binds raw input to every declaration, checks required parameters and the
//! require/forbid relations, and compiles the command line arguments.

use crate::declaration::{ParameterDeclaration, MSG_MANDATORY};
use slotplan_core::{EngineError, ParameterError, ParameterValues, Value};
use tracing::{debug, warn};

/// A declaration together with the value and error of one run
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter<'d> {
    pub declaration: &'d ParameterDeclaration,
    pub value: Option<Value>,
    pub error: Option<String>,
}

impl<'d> BoundParameter<'d> {
    pub fn new(declaration: &'d ParameterDeclaration) -> Self {
        Self {
            declaration,
            value: declaration.initial_value(),
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.declaration.id
    }

    /// Validate and store a raw value, recording the message on failure.
    pub fn set(&mut self, raw: &Value) -> bool {
        match self.declaration.validate(raw) {
            Ok(value) => {
                self.value = Some(value);
                self.error = None;
                true
            }
            Err(message) => {
                self.error = Some(message);
                false
            }
        }
    }

    pub fn constrainable(&self) -> bool {
        self.declaration.constrainable(self.value.as_ref())
    }
}

/// Outcome of [`process_parameters`]
#[derive(Debug, Clone)]
pub struct ParameterReport<'d> {
    pub parameters: Vec<BoundParameter<'d>>,
    /// Arguments for `$PARAMETERS`, in declaration order
    pub command_line: Vec<String>,
}

impl<'d> ParameterReport<'d> {
    pub fn has_errors(&self) -> bool {
        self.parameters.iter().any(|p| p.error.is_some())
    }

    pub fn errors(&self) -> Vec<ParameterError> {
        self.parameters
            .iter()
            .filter_map(|p| p.error.as_ref().map(|e| ParameterError::new(p.id(), e.clone())))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&BoundParameter<'d>> {
        self.parameters.iter().find(|p| p.id() == id)
    }

    /// Snapshot of every parameter that holds a value.
    pub fn values(&self) -> ParameterValues {
        self.parameters
            .iter()
            .filter_map(|p| p.value.clone().map(|v| (p.id().to_string(), v)))
            .collect()
    }

    /// The snapshot, or every collected error.
    pub fn into_values(self) -> Result<ParameterValues, EngineError> {
        if self.has_errors() {
            Err(EngineError::Parameters(self.errors()))
        } else {
            Ok(self.values())
        }
    }
}

/// Process raw input against the declarations.
///
/// Declarations are only borrowed; all run state lives in the report.
pub fn process_parameters<'d, I>(declarations: I, input: &ParameterValues) -> ParameterReport<'d>
where
    I: IntoIterator<Item = &'d ParameterDeclaration>,
{
    let mut parameters = Vec::new();
    let mut command_line = Vec::new();

    for declaration in declarations {
        let mut parameter = BoundParameter::new(declaration);
        match input.get(&declaration.id) {
            Some(raw) => {
                debug!(parameter = %declaration.id, value = %raw, "setting parameter");
                if parameter.set(raw) {
                    if let Some(arg) = parameter.value.as_ref().and_then(|v| declaration.compile_arg(v)) {
                        command_line.push(arg);
                    }
                } else {
                    warn!(
                        parameter = %declaration.id,
                        error = parameter.error.as_deref().unwrap_or_default(),
                        "unable to set parameter"
                    );
                }
            }
            None if declaration.required && parameter.value.is_none() => {
                parameter.error = Some(MSG_MANDATORY.to_string());
            }
            None => {}
        }
        parameters.push(parameter);
    }

    check_relations(&mut parameters);

    ParameterReport {
        parameters,
        command_line,
    }
}

fn check_relations(parameters: &mut [BoundParameter<'_>]) {
    let mut marks: Vec<(usize, usize, String)> = Vec::new();

    for (i, parameter) in parameters.iter().enumerate() {
        let declaration = parameter.declaration;
        if !parameter.constrainable() || (declaration.forbid.is_empty() && declaration.require.is_empty()) {
            continue;
        }
        for (j, other) in parameters.iter().enumerate() {
            if declaration.forbid.iter().any(|id| id == other.id()) && other.constrainable() {
                warn!(parameter = %declaration.id, other = %other.id(), "forbidden combination");
                marks.push((
                    i,
                    j,
                    format!(
                        "Setting parameter '{}' together with '{}' is forbidden",
                        declaration.display_name(),
                        other.declaration.display_name()
                    ),
                ));
            }
            if declaration.require.iter().any(|id| id == other.id()) && !other.constrainable() {
                warn!(parameter = %declaration.id, other = %other.id(), "required companion not set");
                marks.push((
                    i,
                    j,
                    format!(
                        "Parameter '{}' has to be set with '{}'",
                        declaration.display_name(),
                        other.declaration.display_name()
                    ),
                ));
            }
        }
    }

    for (i, j, message) in marks {
        parameters[i].error = Some(message.clone());
        parameters[j].error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declarations() -> Vec<ParameterDeclaration> {
        vec![
            ParameterDeclaration::integer("beam", "Beam size", 1, 10).with_flag("-b"),
            ParameterDeclaration::boolean("verbose", "Verbose").with_flag("-v"),
            ParameterDeclaration::string("model", "Model").required(),
            ParameterDeclaration::string("lexicon", "Lexicon")
                .with_flag("--lexicon=")
                .requiring(&["model"]),
        ]
    }

    #[test]
    fn test_process_collects_command_line() {
        let decls = declarations();
        let input = ParameterValues::new()
            .with("beam", "5")
            .with("verbose", "yes")
            .with("model", "nl");
        let report = process_parameters(&decls, &input);

        assert!(!report.has_errors());
        assert_eq!(report.command_line, vec!["-b 5", "-v", "nl"]);
        let values = report.values();
        assert_eq!(values.get("beam"), Some(&Value::Integer(5)));
        assert_eq!(values.get("verbose"), Some(&Value::Bool(true)));
        assert!(!values.is_set("lexicon"));
    }

    #[test]
    fn test_required_and_invalid() {
        let decls = declarations();
        let input = ParameterValues::new().with("beam", "twenty");
        let report = process_parameters(&decls, &input);

        assert!(report.has_errors());
        assert_eq!(report.get("beam").unwrap().error.as_deref(), Some("Not a number"));
        assert_eq!(report.get("model").unwrap().error.as_deref(), Some(MSG_MANDATORY));
        assert_eq!(report.errors().len(), 2);
        assert!(matches!(report.into_values(), Err(EngineError::Parameters(errors)) if errors.len() == 2));
    }

    #[test]
    fn test_declarations_are_not_mutated() {
        let decls = declarations();
        let before = decls.clone();
        let _ = process_parameters(&decls, &ParameterValues::new().with("beam", "99"));
        assert_eq!(decls, before);
    }

    #[test]
    fn test_forbid_marks_both() {
        let decls = vec![
            ParameterDeclaration::boolean("fast", "Fast").forbidding(&["accurate"]),
            ParameterDeclaration::boolean("accurate", "Accurate"),
        ];
        let input = ParameterValues::new().with("fast", true).with("accurate", true);
        let report = process_parameters(&decls, &input);
        assert!(report.get("fast").unwrap().error.is_some());
        assert!(report.get("accurate").unwrap().error.is_some());

        let input = ParameterValues::new().with("fast", true).with("accurate", false);
        assert!(!process_parameters(&decls, &input).has_errors());
    }

    #[test]
    fn test_require_marks_both() {
        let decls = vec![
            ParameterDeclaration::string("lexicon", "Lexicon").requiring(&["model"]),
            ParameterDeclaration::string("model", "Model"),
        ];
        let report = process_parameters(&decls, &ParameterValues::new().with("lexicon", "x.lex"));
        let message = report.get("model").unwrap().error.clone().unwrap();
        assert_eq!(message, "Parameter 'Lexicon' has to be set with 'Model'");
        assert_eq!(report.get("lexicon").unwrap().error.as_deref(), Some(message.as_str()));
    }

    #[test]
    fn test_defaults_enter_snapshot() {
        let decls = vec![ParameterDeclaration::integer("n", "N", 0, 0).with_default(3i64).required()];
        let report = process_parameters(&decls, &ParameterValues::new());
        assert!(!report.has_errors());
        assert!(report.command_line.is_empty());
        assert_eq!(report.values().get("n"), Some(&Value::Integer(3)));
    }
}
