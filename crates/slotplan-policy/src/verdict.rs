//! Validation verdicts
//!
//! The outcome of checking one metadata record against its format schema and
//! constraints.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    /// Record passed every check
    Valid,
    /// Record failed; the first failing check is reported
    Invalid {
        reason: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        violations: Vec<Violation>,
    },
}

impl ValidationResult {
    pub fn valid() -> Self {
        ValidationResult::Valid
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationResult::Invalid {
            reason: reason.into(),
            violations: Vec::new(),
        }
    }

    pub fn with_violation(self, violation: Violation) -> Self {
        match self {
            ValidationResult::Valid => ValidationResult::Invalid {
                reason: violation.description.clone(),
                violations: vec![violation],
            },
            ValidationResult::Invalid { reason, mut violations } => {
                violations.push(violation);
                ValidationResult::Invalid { reason, violations }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { reason, .. } => Some(reason),
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Invalid { violations, .. } => violations,
            ValidationResult::Valid => &[],
        }
    }

    /// Keep the earlier failure when both failed
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => other,
            invalid => invalid,
        }
    }
}

/// One violated constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Index of the constraint within the record's constraint list
    pub constraint: usize,
    pub description: String,
}

impl Violation {
    pub fn new(constraint: usize, description: impl Into<String>) -> Self {
        Self {
            constraint,
            description: description.into(),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationResult::Valid => write!(f, "VALID"),
            ValidationResult::Invalid { reason, violations } => {
                write!(f, "INVALID: {}", reason)?;
                if violations.len() > 1 {
                    write!(f, " ({} violations)", violations.len())?;
                }
                Ok(())
            }
        }
    }
}
