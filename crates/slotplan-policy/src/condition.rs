//! Parameter conditions
//!
//! A condition gates a branch on the parameter values of a run. It is an
//! immutable tree: each branch is either a leaf (an output template, a
//! metadata operation, ...) or another condition. Evaluation walks the tree
//! read-only and yields the selected leaf, or nothing.

use serde::{Deserialize, Serialize};
use slotplan_core::{ConfigurationError, Operator, ParameterValues, Value};

/// `(parameter, operator, reference value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(alias = "key")]
    pub parameter: String,
    #[serde(default)]
    pub op: Operator,
    #[serde(default = "default_reference")]
    pub value: Value,
}

fn default_reference() -> Value {
    Value::Bool(true)
}

impl Comparison {
    pub fn new(parameter: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            parameter: parameter.into(),
            op,
            value: value.into(),
        }
    }

    pub fn holds(&self, parameters: &ParameterValues) -> bool {
        self.op.test_optional(parameters.get(&self.parameter), &self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Branch<T> {
    Leaf(T),
    Nested(Box<ParameterCondition<T>>),
}

impl<T> Branch<T> {
    /// The leaf this branch selects for `parameters`, if any.
    pub fn evaluate(&self, parameters: &ParameterValues) -> Option<&T> {
        match self {
            Branch::Leaf(leaf) => Some(leaf),
            Branch::Nested(condition) => condition.evaluate(parameters),
        }
    }

    /// Every leaf reachable from this branch, selected or not.
    pub fn leaves(&self) -> Vec<&T> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    /// Rebuild the branch with every leaf passed through `f`.
    pub fn try_map<U, E, F>(self, f: &mut F) -> Result<Branch<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(match self {
            Branch::Leaf(leaf) => Branch::Leaf(f(leaf)?),
            Branch::Nested(condition) => Branch::Nested(Box::new((*condition).try_map(f)?)),
        })
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a T>) {
        match self {
            Branch::Leaf(leaf) => leaves.push(leaf),
            Branch::Nested(condition) => condition.collect_leaves(leaves),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCondition<T> {
    comparisons: Vec<Comparison>,
    disjunction: bool,
    then: Branch<T>,
    otherwise: Option<Branch<T>>,
}

impl<T> ParameterCondition<T> {
    pub fn new(comparisons: Vec<Comparison>, then: Branch<T>) -> Result<Self, ConfigurationError> {
        if comparisons.is_empty() {
            return Err(ConfigurationError::MalformedCondition {
                reason: "a condition needs at least one comparison".to_string(),
            });
        }
        Ok(Self {
            comparisons,
            disjunction: false,
            then,
            otherwise: None,
        })
    }

    pub fn with_otherwise(mut self, otherwise: Branch<T>) -> Self {
        self.otherwise = Some(otherwise);
        self
    }

    pub fn disjunctive(mut self) -> Self {
        self.disjunction = true;
        self
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn is_disjunction(&self) -> bool {
        self.disjunction
    }

    /// Conjunction of the comparisons, or disjunction when flagged.
    pub fn matches(&self, parameters: &ParameterValues) -> bool {
        if self.disjunction {
            self.comparisons.iter().any(|c| c.holds(parameters))
        } else {
            self.comparisons.iter().all(|c| c.holds(parameters))
        }
    }

    /// The selected leaf, or `None` when no branch applies.
    pub fn evaluate(&self, parameters: &ParameterValues) -> Option<&T> {
        if self.matches(parameters) {
            self.then.evaluate(parameters)
        } else {
            self.otherwise.as_ref().and_then(|branch| branch.evaluate(parameters))
        }
    }

    /// Every leaf reachable through any branch.
    pub fn leaves(&self) -> Vec<&T> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    /// Same condition tree with every leaf passed through `f`.
    pub fn try_map<U, E, F>(self, f: &mut F) -> Result<ParameterCondition<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        let then = self.then.try_map(f)?;
        let otherwise = match self.otherwise {
            Some(branch) => Some(branch.try_map(f)?),
            None => None,
        };
        Ok(ParameterCondition {
            comparisons: self.comparisons,
            disjunction: self.disjunction,
            then,
            otherwise,
        })
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a T>) {
        self.then.collect_leaves(leaves);
        if let Some(otherwise) = &self.otherwise {
            otherwise.collect_leaves(leaves);
        }
    }
}

/// Declarative form of a condition as written in a service definition.
///
/// ```yaml
/// if:
///   - { parameter: summary, op: equals, value: true }
/// then: ...
/// else: ...
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec<B> {
    #[serde(rename = "if", alias = "conditions")]
    pub comparisons: Vec<Comparison>,
    #[serde(default)]
    pub disjunction: bool,
    pub then: B,
    #[serde(rename = "else", alias = "otherwise")]
    pub otherwise: Option<B>,
}

impl<B> ConditionSpec<B> {
    /// Compile into a condition tree, turning each declared branch into a
    /// [`Branch`] with `branch`.
    pub fn compile<T, E>(
        self,
        mut branch: impl FnMut(B) -> Result<Branch<T>, E>,
    ) -> Result<ParameterCondition<T>, E>
    where
        E: From<ConfigurationError>,
    {
        let then = branch(self.then)?;
        let mut condition = ParameterCondition::new(self.comparisons, then)?;
        if let Some(otherwise) = self.otherwise {
            condition = condition.with_otherwise(branch(otherwise)?);
        }
        if self.disjunction {
            condition = condition.disjunctive();
        }
        Ok(condition)
    }
}
