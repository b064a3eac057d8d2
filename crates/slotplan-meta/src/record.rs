//! Metadata records
//!
//! A record pairs a format schema with an attribute map, optional provenance
//! and the constraints it must satisfy. Validation runs at most once per
//! record: the verdict is memoised and only a new record (built through the
//! consuming `with_*` methods) validates again.

use crate::provenance::Provenance;
use slotplan_core::{FormatSchema, ValidationError, Value, VALIDATION_ERROR_KEY};
use slotplan_policy::{check_constraints, Constraint, ValidationResult};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    format: FormatSchema,
    attributes: BTreeMap<String, Value>,
    provenance: Option<Provenance>,
    constraints: Vec<Constraint>,
    input_template: Option<String>,
    validation: Option<ValidationResult>,
}

impl MetadataRecord {
    pub fn new(format: FormatSchema) -> Self {
        let mut attributes = BTreeMap::new();
        format.apply_fixed(&mut attributes);
        Self {
            format,
            attributes,
            provenance: None,
            constraints: Vec::new(),
            input_template: None,
            validation: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self.validation = None;
        self
    }

    /// Replace the attribute map; fixed attributes of the format are kept.
    pub fn with_attributes(mut self, attributes: BTreeMap<String, Value>) -> Self {
        self.attributes = attributes;
        self.format.apply_fixed(&mut self.attributes);
        self.validation = None;
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self.validation = None;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<Constraint>) -> Self {
        self.constraints = constraints;
        self.validation = None;
        self
    }

    pub fn with_input_template(mut self, template_id: impl Into<String>) -> Self {
        self.input_template = Some(template_id.into());
        self
    }

    pub fn format(&self) -> &FormatSchema {
        &self.format
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn input_template(&self) -> Option<&str> {
        self.input_template.as_deref()
    }

    /// Cached verdict, if the record was validated already.
    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    /// Validate against the format schema and every constraint.
    ///
    /// Computed once; later calls return the cached verdict. On failure the
    /// reason is also stored under the `validation_error` attribute.
    pub fn validate(&mut self) -> &ValidationResult {
        if self.validation.is_none() {
            let result = match self.format.check(&self.attributes) {
                Err(reason) => ValidationResult::invalid(reason),
                Ok(()) => check_constraints(&self.constraints, &self.attributes),
            };
            if let Some(reason) = result.reason() {
                debug!(format = %self.format.id, reason, "metadata failed validation");
                self.attributes
                    .insert(VALIDATION_ERROR_KEY.to_string(), Value::text(reason));
            }
            self.validation = Some(result);
        }
        self.validation.get_or_insert(ValidationResult::Valid)
    }

    pub fn is_valid(&mut self) -> bool {
        self.validate().is_valid()
    }

    /// Validate and hand the record back, or the reason it failed for `filename`.
    pub fn into_validated(mut self, filename: &str) -> Result<Self, ValidationError> {
        match self.validate().reason() {
            Some(reason) => Err(ValidationError::new(filename, reason)),
            None => Ok(self),
        }
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

    #[test]
    fn test_valid_record() {
        let mut record = MetadataRecord::new(plaintext()).with_attribute("encoding", "utf-8");
        assert!(record.validation().is_none());
        assert!(record.is_valid());
        assert_eq!(record.validation(), Some(&ValidationResult::Valid));
    }

    #[test]
    fn test_invalid_record_stores_reason() {
        let schema = FormatSchema::new("StrictFormat", "Strict", "text/plain")
            .with_attribute("encoding", AttributeRule::required());
        let mut record = MetadataRecord::new(schema);
        assert!(!record.is_valid());
        assert!(record.get(VALIDATION_ERROR_KEY).is_some());
        assert!(record.clone().into_validated("a.txt").is_err());
    }

    #[test]
    fn test_constraint_failure() {
        let mut record = MetadataRecord::new(plaintext())
            .with_attribute("language", "fr")
            .with_constraints(vec![Constraint::require(vec![AttributeTest::new(
                "language",
                Operator::InCommaList,
                "en",
            )])]);
        // reference value is the member, attribute value is the list
        assert!(!record.is_valid());

        let mut record = record.with_attribute("language", "en,nl");
        assert!(record.validation().is_none());
        assert!(record.is_valid());
    }

    #[test]
    fn test_validation_is_memoised() {
        let schema = FormatSchema::new("StrictFormat", "Strict", "text/plain")
            .with_attribute("encoding", AttributeRule::required());
        let mut record = MetadataRecord::new(schema);
        let first = record.validate().clone();
        // the stored validation_error attribute must not change the cached verdict
        let second = record.validate().clone();
        assert_eq!(first, second);
    }
}
