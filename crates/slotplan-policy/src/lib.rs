//! slotplan policy: predicates over metadata and parameters
//!
//! ```text
//! attributes ──► Constraint (require | forbid) ──► ValidationResult
//! parameters ──► ParameterCondition<T> ──► Option<&T>
//! ```
//!
//! # Example
//!
//! ```
//! use slotplan_core::{Operator, ParameterValues, Value};
//! use slotplan_policy::{AttributeTest, Branch, Comparison, Constraint, ParameterCondition};
//! use std::collections::BTreeMap;
//!
//! let constraint = Constraint::require(vec![AttributeTest::new("language", Operator::Equals, "en")]);
//! let mut attributes = BTreeMap::new();
//! assert!(!constraint.test(&attributes));
//! attributes.insert("language".to_string(), Value::text("en"));
//! assert!(constraint.test(&attributes));
//!
//! let condition = ParameterCondition::new(
//!     vec![Comparison::new("summary", Operator::Equals, true)],
//!     Branch::Leaf("summary.txt"),
//! )
//! .unwrap();
//! assert_eq!(condition.evaluate(&ParameterValues::new()), None);
//! ```

pub mod condition;
pub mod constraints;
pub mod verdict;

pub use condition::{Branch, Comparison, ConditionSpec, ParameterCondition};
pub use constraints::{check_constraints, AttributeTest, Constraint, ConstraintKind};
pub use verdict::{ValidationResult, Violation};
