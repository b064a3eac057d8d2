//! Metadata field operations
//!
//! Each operation derives one attribute of a generated record. Operations run
//! in declared order over a mutable attribute map and report whether they
//! changed anything; an operation whose precondition does not hold is a no-op.

use serde::{Deserialize, Serialize};
use slotplan_core::{ConfigurationError, ParameterValues, Value};
use slotplan_meta::MetadataRecord;
use slotplan_policy::{Branch, ConditionSpec};
use std::collections::BTreeMap;

/// An input file taking part in one generation step.
#[derive(Debug, Clone, Copy)]
pub struct RelevantInput<'a> {
    pub template: &'a str,
    pub filename: &'a str,
    pub metadata: Option<&'a MetadataRecord>,
}

/// What an operation may read besides the attribute map it edits.
#[derive(Debug, Clone, Copy)]
pub struct MetaContext<'a> {
    pub parameters: &'a ParameterValues,
    pub inputs: &'a [RelevantInput<'a>],
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaOp {
    Set {
        key: String,
        value: Value,
    },
    /// Remove `key`, only when it currently equals `value` if one is given.
    Unset {
        key: String,
        value: Option<Value>,
    },
    /// Copy `source_key` (default `key`) from the relevant input of `template`.
    Copy {
        key: String,
        template: String,
        source_key: Option<String>,
    },
    FromParameter {
        key: String,
        parameter: String,
    },
}

impl MetaOp {
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        MetaOp::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn unset(key: impl Into<String>) -> Self {
        MetaOp::Unset {
            key: key.into(),
            value: None,
        }
    }

    /// Build a copy operation from a `templateid[.key]` source reference.
    pub fn copy(key: impl Into<String>, from: &str) -> Result<Self, ConfigurationError> {
        let key = key.into();
        let (template, source_key) = match from.split_once('.') {
            None => (from, None),
            Some((template, source)) if !source.contains('.') && !source.is_empty() => {
                (template, Some(source.to_string()))
            }
            Some(_) => {
                return Err(ConfigurationError::InvalidMetaOp {
                    key,
                    reason: format!("cannot parse copy source `{}`", from),
                })
            }
        };
        if template.is_empty() {
            return Err(ConfigurationError::InvalidMetaOp {
                key,
                reason: "copy source names no template".to_string(),
            });
        }
        Ok(MetaOp::Copy {
            key,
            template: template.to_string(),
            source_key,
        })
    }

    pub fn from_parameter(key: impl Into<String>, parameter: impl Into<String>) -> Self {
        MetaOp::FromParameter {
            key: key.into(),
            parameter: parameter.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            MetaOp::Set { key, .. }
            | MetaOp::Unset { key, .. }
            | MetaOp::Copy { key, .. }
            | MetaOp::FromParameter { key, .. } => key,
        }
    }

    /// Apply to `attributes`; `true` when the map changed.
    pub fn apply(&self, attributes: &mut BTreeMap<String, Value>, ctx: &MetaContext<'_>) -> bool {
        match self {
            MetaOp::Set { key, value } => {
                attributes.insert(key.clone(), value.clone());
                true
            }
            MetaOp::Unset { key, value } => {
                let matches = match (attributes.get(key), value) {
                    (None, _) => false,
                    (Some(_), None) => true,
                    (Some(current), Some(expected)) => current.loosely_equals(expected),
                };
                if matches {
                    attributes.remove(key);
                }
                matches
            }
            MetaOp::Copy {
                key,
                template,
                source_key,
            } => {
                let source = source_key.as_deref().unwrap_or(key);
                let mut edited = false;
                for input in ctx.inputs.iter().filter(|i| i.template == template) {
                    if let Some(value) = input.metadata.and_then(|m| m.get(source)) {
                        attributes.insert(key.clone(), value.clone());
                        edited = true;
                    }
                }
                edited
            }
            MetaOp::FromParameter { key, parameter } => match ctx.parameters.get(parameter) {
                Some(value) => {
                    attributes.insert(key.clone(), value.clone());
                    true
                }
                None => false,
            },
        }
    }
}

/// Run `fields` in order, resolving conditional ones against the parameters.
///
/// Returns how many operations changed the map.
pub fn apply_metafields(
    fields: &[Branch<MetaOp>],
    attributes: &mut BTreeMap<String, Value>,
    ctx: &MetaContext<'_>,
) -> usize {
    let mut changed = 0;
    for op in fields.iter().filter_map(|field| field.evaluate(ctx.parameters)) {
        if op.apply(attributes, ctx) {
            changed += 1;
        }
    }
    changed
}

/// A metadata field as written in a service definition.
///
/// ```yaml
/// - { op: set, key: encoding, value: utf-8 }
/// - { op: copy, key: language, from: text.language }
/// - op: condition
///   if: [{ parameter: lowercase }]
///   then: { op: set, key: case, value: lower }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum MetaFieldSpec {
    Set {
        key: String,
        value: Value,
    },
    Unset {
        key: String,
        #[serde(default)]
        value: Option<Value>,
    },
    Copy {
        key: String,
        from: String,
    },
    Parameter {
        key: String,
        parameter: String,
    },
    Condition(Box<ConditionSpec<MetaFieldSpec>>),
}

impl MetaFieldSpec {
    pub fn compile(self) -> Result<Branch<MetaOp>, ConfigurationError> {
        let op = match self {
            MetaFieldSpec::Set { key, value } => MetaOp::Set { key, value },
            MetaFieldSpec::Unset { key, value } => MetaOp::Unset { key, value },
            MetaFieldSpec::Copy { key, from } => MetaOp::copy(key, &from)?,
            MetaFieldSpec::Parameter { key, parameter } => MetaOp::FromParameter { key, parameter },
            MetaFieldSpec::Condition(spec) => {
                let condition = (*spec).compile(MetaFieldSpec::compile)?;
                return Ok(Branch::Nested(Box::new(condition)));
            }
        };
        Ok(Branch::Leaf(op))
    }
}
