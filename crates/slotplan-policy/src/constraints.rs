//! Require/forbid constraints over metadata attributes
//!
//! A constraint holds a list of attribute tests combined disjunctively.
//! `require` is satisfied when any test holds; `forbid` is violated when any
//! test holds. A test whose attribute is absent never holds.

use crate::verdict::{ValidationResult, Violation};
use serde::{Deserialize, Serialize};
use slotplan_core::{Operator, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Require,
    Forbid,
}

/// `(attribute, operator, reference value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTest {
    pub key: String,
    #[serde(default)]
    pub op: Operator,
    pub value: Value,
}

impl AttributeTest {
    pub fn new(key: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    pub fn holds(&self, attributes: &BTreeMap<String, Value>) -> bool {
        match attributes.get(&self.key) {
            Some(actual) => self.op.test(actual, &self.value),
            None => false,
        }
    }
}

impl fmt::Display for AttributeTest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.op, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub tests: Vec<AttributeTest>,
}

impl Constraint {
    pub fn require(tests: Vec<AttributeTest>) -> Self {
        Self {
            kind: ConstraintKind::Require,
            tests,
        }
    }

    pub fn forbid(tests: Vec<AttributeTest>) -> Self {
        Self {
            kind: ConstraintKind::Forbid,
            tests,
        }
    }

    /// Whether the attributes satisfy this constraint
    pub fn test(&self, attributes: &BTreeMap<String, Value>) -> bool {
        let any_holds = self.tests.iter().any(|t| t.holds(attributes));
        match self.kind {
            ConstraintKind::Require => any_holds,
            ConstraintKind::Forbid => !any_holds,
        }
    }

    pub fn describe(&self) -> String {
        let tests = self
            .tests
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        match self.kind {
            ConstraintKind::Require => format!("requires {}", tests),
            ConstraintKind::Forbid => format!("forbids {}", tests),
        }
    }
}

/// Check every constraint, collecting all that are violated.
pub fn check_constraints(
    constraints: &[Constraint],
    attributes: &BTreeMap<String, Value>,
) -> ValidationResult {
    constraints
        .iter()
        .enumerate()
        .filter(|(_, constraint)| !constraint.test(attributes))
        .fold(ValidationResult::valid(), |result, (index, constraint)| {
            debug!(constraint = index, "constraint violated: {}", constraint.describe());
            result.with_violation(Violation::new(
                index,
                format!("Constraint violated: {}", constraint.describe()),
            ))
        })
}
