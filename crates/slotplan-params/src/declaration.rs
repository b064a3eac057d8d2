//! Parameter declarations
//!
//! A declaration is part of the service definition and is never mutated by
//! a run. Validation returns the normalised value (or a message) instead of
//! storing state on the declaration.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use slotplan_core::{ConfigurationError, Value};

/// Characters that force a value to be quoted on the command line
const SHELL_SENSITIVE: [char; 13] = [' ', ';', '|', '&', '!', '\'', '"', '`', '>', '<', '\n', '\r', '\t'];

pub const MSG_MANDATORY: &str = "This parameter is mandatory and must be set!";
pub const MSG_UNINTERPRETABLE: &str = "Invalid value, unable to interpret";

/// A choice: either a plain key or a key with a display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Choice {
    Plain(String),
    Labelled { id: String, label: String },
}

impl Choice {
    pub fn key(&self) -> &str {
        match self {
            Choice::Plain(key) => key,
            Choice::Labelled { id, .. } => id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Choice::Plain(key) => key,
            Choice::Labelled { label, .. } => label,
        }
    }
}

/// Regular expression a text value must match, compiled once on first use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Pattern {
    source: String,
    compiled: OnceCell<Regex>,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> Result<&Regex, regex::Error> {
        self.compiled.get_or_try_init(|| Regex::new(&self.source))
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Pattern::new(source)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterKind {
    /// Single line of text
    String {
        #[serde(default)]
        maxlength: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
    },
    /// Multi-line text
    Text {
        #[serde(default)]
        maxlength: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
    },
    Integer {
        #[serde(default, alias = "minvalue")]
        min: i64,
        #[serde(default, alias = "maxvalue")]
        max: i64,
    },
    Float {
        #[serde(default, alias = "minvalue")]
        min: f64,
        #[serde(default, alias = "maxvalue")]
        max: f64,
    },
    Boolean {
        /// Emit the flag when the value is false instead of true
        #[serde(default)]
        reverse: bool,
    },
    Choice {
        #[serde(default)]
        choices: Vec<Choice>,
        #[serde(default)]
        multi: bool,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    /// Fixed value that cannot be changed
    Static {
        #[serde(default)]
        value: Option<Value>,
    },
}

impl ParameterKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParameterKind::String { .. } => "string",
            ParameterKind::Text { .. } => "text",
            ParameterKind::Integer { .. } => "integer",
            ParameterKind::Float { .. } => "float",
            ParameterKind::Boolean { .. } => "boolean",
            ParameterKind::Choice { .. } => "choice",
            ParameterKind::Static { .. } => "static",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    /// Ids of parameters that must be set along with this one
    #[serde(default)]
    pub require: Vec<String>,
    /// Ids of parameters that may not be set along with this one
    #[serde(default)]
    pub forbid: Vec<String>,
    #[serde(default, alias = "paramflag", alias = "option", skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default)]
    pub nospace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterDeclaration {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind,
            required: false,
            require: Vec::new(),
            forbid: Vec::new(),
            flag: None,
            nospace: false,
            default: None,
        }
    }

    pub fn string(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ParameterKind::String { maxlength: 0, pattern: None })
    }

    pub fn integer(id: impl Into<String>, name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(id, name, ParameterKind::Integer { min, max })
    }

    pub fn float(id: impl Into<String>, name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::new(id, name, ParameterKind::Float { min, max })
    }

    pub fn boolean(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ParameterKind::Boolean { reverse: false })
    }

    pub fn choice(id: impl Into<String>, name: impl Into<String>, choices: &[&str]) -> Self {
        Self::new(
            id,
            name,
            ParameterKind::Choice {
                choices: choices.iter().map(|c| Choice::Plain(c.to_string())).collect(),
                multi: false,
                delimiter: default_delimiter(),
            },
        )
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn requiring(mut self, ids: &[&str]) -> Self {
        self.require = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn forbidding(mut self, ids: &[&str]) -> Self {
        self.forbid = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Load-time sanity checks.
    pub fn check(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidParameter {
            parameter_id: self.id.clone(),
            reason,
        };
        if self.id.is_empty() {
            return Err(invalid("parameter id may not be empty".to_string()));
        }
        match &self.kind {
            ParameterKind::Static { value: None } => {
                return Err(invalid("static parameter requires a value".to_string()))
            }
            ParameterKind::Choice { choices, .. } if choices.is_empty() => {
                return Err(invalid("no choices specified".to_string()))
            }
            ParameterKind::String { pattern: Some(pattern), .. }
            | ParameterKind::Text { pattern: Some(pattern), .. } => {
                pattern.regex().map_err(|e| invalid(format!("invalid pattern: {}", e)))?;
            }
            _ => {}
        }
        if let Some(default) = &self.default {
            self.validate(default)
                .map_err(|e| invalid(format!("default value is invalid: {}", e)))?;
        }
        Ok(())
    }

    /// Value a parameter holds before any input is applied.
    pub fn initial_value(&self) -> Option<Value> {
        match &self.kind {
            ParameterKind::Static { value } => value.clone(),
            _ => self.default.as_ref().and_then(|d| self.validate(d).ok()),
        }
    }

    /// Validate a raw value, returning the normalised value or a message.
    pub fn validate(&self, raw: &Value) -> Result<Value, String> {
        match &self.kind {
            ParameterKind::String { maxlength, pattern } | ParameterKind::Text { maxlength, pattern } => {
                let text = raw.to_string();
                if *maxlength > 0 && text.chars().count() > *maxlength {
                    return Err(format!(
                        "Text too long, exceeding maximum of {} characters allowed",
                        maxlength
                    ));
                }
                if let Some(pattern) = pattern {
                    let regex = pattern.regex().map_err(|_| MSG_UNINTERPRETABLE.to_string())?;
                    if !regex.is_match(&text) {
                        return Err("Invalid value".to_string());
                    }
                }
                Ok(Value::Text(text))
            }
            ParameterKind::Integer { min, max } => {
                let value = match raw {
                    Value::Integer(i) => *i,
                    Value::Float(f) => f.round() as i64,
                    Value::Text(s) => s.trim().parse::<i64>().map_err(|_| "Not a number".to_string())?,
                    _ => return Err("Not a number".to_string()),
                };
                if in_range(value, *min, *max) {
                    Ok(Value::Integer(value))
                } else {
                    Err(format!("Number must be a whole number between {} and {}", min, max))
                }
            }
            ParameterKind::Float { min, max } => {
                let value = match raw {
                    Value::Bool(_) | Value::List(_) => None,
                    other => other.as_f64(),
                }
                .ok_or_else(|| "Not a valid number".to_string())?;
                if in_range(value, *min, *max) {
                    Ok(Value::Float(value))
                } else {
                    Err(format!("Number must be between {} and {}", min, max))
                }
            }
            ParameterKind::Boolean { .. } => Ok(Value::Bool(truthy_input(raw))),
            ParameterKind::Choice { choices, multi, delimiter } => {
                let items = match raw {
                    Value::List(items) => items.clone(),
                    Value::Text(text) if *multi => text
                        .split(delimiter.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                    other => vec![other.to_string()],
                };
                if !multi && items.len() > 1 {
                    return Err("Multiple values were specified, but only one is allowed!".to_string());
                }
                if let Some(bad) = items.iter().find(|v| !choices.iter().any(|c| c.key() == v.as_str())) {
                    return Err(format!("Selected value was not an option! ({})", bad));
                }
                if *multi {
                    return Ok(Value::List(items));
                }
                items
                    .into_iter()
                    .next()
                    .map(Value::Text)
                    .ok_or_else(|| MSG_UNINTERPRETABLE.to_string())
            }
            ParameterKind::Static { value } => value.clone().ok_or_else(|| MSG_UNINTERPRETABLE.to_string()),
        }
    }

    /// Whether a value counts as "set" for require/forbid relations.
    pub fn constrainable(&self, value: Option<&Value>) -> bool {
        match (&self.kind, value) {
            (_, None) => false,
            (ParameterKind::Boolean { .. }, Some(value)) => value.is_truthy(),
            (ParameterKind::Integer { .. } | ParameterKind::Float { .. }, Some(value)) => {
                value.as_f64().map(|n| n != 0.0).unwrap_or(false)
            }
            (_, Some(_)) => true,
        }
    }

    /// Render the value as a shell argument, `None` when nothing is emitted.
    pub fn compile_arg(&self, value: &Value) -> Option<String> {
        if let ParameterKind::Boolean { reverse } = &self.kind {
            let flag = self.flag.as_ref()?;
            return (value.is_truthy() != *reverse).then(|| flag.clone());
        }

        let rendered = match (&self.kind, value) {
            (ParameterKind::Choice { delimiter, .. }, Value::List(items)) => items.join(delimiter),
            (_, value) => value.to_string(),
        };
        let rendered = shell_quote(&rendered);

        match &self.flag {
            Some(flag) if flag.ends_with('=') || self.nospace => Some(format!("{}{}", flag, rendered)),
            Some(flag) => Some(format!("{} {}", flag, rendered)),
            None if rendered.is_empty() => None,
            None => Some(rendered),
        }
    }
}

fn in_range<N: PartialOrd + Default>(value: N, min: N, max: N) -> bool {
    let zero = N::default();
    (min == zero && max == zero) || max < min || (value >= min && value <= max)
}

fn truthy_input(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::Integer(i) => *i == 1,
        Value::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "yes" | "true" | "enabled"),
        _ => false,
    }
}

fn shell_quote(value: &str) -> String {
    if value.contains(SHELL_SENSITIVE) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
