//! Comparison operators shared by constraints and parameter conditions
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    GreaterEqualThan,
    LessThan,
    LessEqualThan,
    /// Actual value (text or list) contains the reference
    Contains,
    /// Actual value is a comma separated list holding the reference
    InCommaList,
    /// Actual value is a space separated list holding the reference
    InSpaceList,
    /// Truthiness of the actual value equals truthiness of the reference
    Set,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThan,
        Operator::GreaterEqualThan,
        Operator::LessThan,
        Operator::LessEqualThan,
        Operator::Contains,
        Operator::InCommaList,
        Operator::InSpaceList,
        Operator::Set,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "notequals",
            Operator::GreaterThan => "greaterthan",
            Operator::GreaterEqualThan => "greaterequalthan",
            Operator::LessThan => "lessthan",
            Operator::LessEqualThan => "lessequalthan",
            Operator::Contains => "contains",
            Operator::InCommaList => "incommalist",
            Operator::InSpaceList => "inspacelist",
            Operator::Set => "set",
        }
    }

    /// Apply the operator to a present value.
    pub fn test(&self, actual: &Value, reference: &Value) -> bool {
        match self {
            Operator::Equals => actual.loosely_equals(reference),
            Operator::NotEquals => !actual.loosely_equals(reference),
            Operator::GreaterThan => ordered(actual, reference, |o| o == Ordering::Greater),
            Operator::GreaterEqualThan => ordered(actual, reference, |o| o != Ordering::Less),
            Operator::LessThan => ordered(actual, reference, |o| o == Ordering::Less),
            Operator::LessEqualThan => ordered(actual, reference, |o| o != Ordering::Greater),
            Operator::Contains => match actual {
                Value::List(items) => items.iter().any(|item| *item == reference.to_string()),
                Value::Bool(false) => false,
                other => other.to_string().contains(&reference.to_string()),
            },
            Operator::InCommaList => actual
                .to_string()
                .split(',')
                .any(|item| item.trim() == reference.to_string()),
            Operator::InSpaceList => actual
                .to_string()
                .split_whitespace()
                .any(|item| item == reference.to_string()),
            Operator::Set => actual.is_truthy() == reference.is_truthy(),
        }
    }

    /// Apply the operator where the value may be absent (unset parameter).
    ///
    /// Absence satisfies only `notequals` and a negated `set`.
    pub fn test_optional(&self, actual: Option<&Value>, reference: &Value) -> bool {
        match actual {
            Some(value) => self.test(value, reference),
            None => match self {
                Operator::NotEquals => true,
                Operator::Set => !reference.is_truthy(),
                _ => false,
            },
        }
    }
}

fn ordered(actual: &Value, reference: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if matches!(actual, Value::Bool(false)) {
        return false;
    }
    let ordering = match (actual.as_f64(), reference.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(actual.to_string().cmp(&reference.to_string())),
    };
    ordering.map(accept).unwrap_or(false)
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == lowered)
            .ok_or_else(|| format!("unknown operator `{}`", s))
    }
}
