//! Format schemas
//!
//! A [`FormatSchema`] declares which attributes a metadata record of a given
//! kind may or must carry. Builtin schemas form a closed base set; services
//! add their own through a [`FormatRegistry`] that is passed around
//! explicitly. Lookups consult the registry first, then the builtins.
use crate::error::ConfigurationError;
use crate::value::Value;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Attribute key used to store the reason a record failed validation.
pub const VALIDATION_ERROR_KEY: &str = "validation_error";

/// What a schema says about one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum AttributeRule {
    /// Always carries exactly this value (filled in when absent)
    Fixed { value: Value },
    /// Must be one of an enumerated set of values
    OneOf {
        values: Vec<Value>,
        #[serde(default)]
        required: bool,
    },
    /// Free value
    Open {
        #[serde(default)]
        required: bool,
    },
}

impl AttributeRule {
    pub fn open() -> Self {
        AttributeRule::Open { required: false }
    }

    pub fn required() -> Self {
        AttributeRule::Open { required: true }
    }

    pub fn one_of(values: &[&str], required: bool) -> Self {
        AttributeRule::OneOf {
            values: values.iter().map(|v| Value::text(*v)).collect(),
            required,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            AttributeRule::Fixed { .. } => true,
            AttributeRule::OneOf { required, .. } | AttributeRule::Open { required } => *required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSchema {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_mimetype")]
    pub mimetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeRule>,
    #[serde(default = "default_true", alias = "allowcustomattributes")]
    pub allow_custom_attributes: bool,
}

fn default_mimetype() -> String {
    "text/plain".to_string()
}

fn default_true() -> bool {
    true
}

impl FormatSchema {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mimetype: mimetype.into(),
            schema: None,
            attributes: BTreeMap::new(),
            allow_custom_attributes: true,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, rule: AttributeRule) -> Self {
        self.attributes.insert(key.into(), rule);
        self
    }

    pub fn closed(mut self) -> Self {
        self.allow_custom_attributes = false;
        self
    }

    /// Fill in fixed attributes that are missing.
    pub fn apply_fixed(&self, attributes: &mut BTreeMap<String, Value>) {
        for (key, rule) in &self.attributes {
            if let AttributeRule::Fixed { value } = rule {
                attributes.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    /// Check an attribute map against the schema, returning the first reason
    /// it fails.
    pub fn check(&self, attributes: &BTreeMap<String, Value>) -> Result<(), String> {
        for (key, rule) in &self.attributes {
            let actual = attributes.get(key);
            match (rule, actual) {
                (rule, None) if rule.is_required() => {
                    return Err(format!(
                        "Required metadata attribute {} not specified (format: {})",
                        key, self.id
                    ));
                }
                (AttributeRule::Fixed { value }, Some(actual)) if !actual.loosely_equals(value) => {
                    return Err(format!(
                        "Attribute {} must have the fixed value {}, got {} (format: {})",
                        key, value, actual, self.id
                    ));
                }
                (AttributeRule::OneOf { values, .. }, Some(actual))
                    if !values.iter().any(|v| v.loosely_equals(actual)) =>
                {
                    let allowed = values.iter().map(ToString::to_string).collect::<Vec<_>>();
                    return Err(format!(
                        "Attribute assignment {}={} has an invalid value, choose one of: {} (format: {})",
                        key,
                        actual,
                        allowed.join(" "),
                        self.id
                    ));
                }
                _ => {}
            }
        }

        if !self.allow_custom_attributes {
            if let Some(extra) = attributes
                .keys()
                .find(|key| key.as_str() != VALIDATION_ERROR_KEY && !self.attributes.contains_key(*key))
            {
                return Err(format!(
                    "Invalid attribute '{}' specified, but this format does not allow custom attributes (format: {})",
                    extra, self.id
                ));
            }
        }

        Ok(())
    }
}

static BUILTIN_FORMATS: Lazy<BTreeMap<String, FormatSchema>> = Lazy::new(|| {
    let text_attributes = |schema: FormatSchema| {
        schema
            .with_attribute("encoding", AttributeRule::open())
            .with_attribute("language", AttributeRule::open())
    };
    let annotation_layers = [
        "text-annotation",
        "token-annotation",
        "sentence-annotation",
        "paragraph-annotation",
        "pos-annotation",
        "lemma-annotation",
        "entity-annotation",
        "syntax-annotation",
    ];
    let mut folia = FormatSchema::new("FoLiAXMLFormat", "FoLiA XML", "text/xml")
        .with_attribute("version", AttributeRule::open());
    for layer in annotation_layers {
        folia = folia.with_attribute(layer, AttributeRule::open());
    }

    [
        text_attributes(FormatSchema::new("PlainTextFormat", "Plain Text Format", "text/plain")),
        text_attributes(FormatSchema::new("HTMLFormat", "HTML Format", "text/html")),
        FormatSchema::new("CSVFormat", "Comma Separated Values", "text/csv")
            .with_attribute("encoding", AttributeRule::required())
            .with_attribute("language", AttributeRule::open()),
        FormatSchema::new("XMLFormat", "XML Format (generic, not further specified)", "text/xml"),
        FormatSchema::new("JSONFormat", "JSON Format (generic, not further specified)", "application/json"),
        FormatSchema::new("BinaryDataFormat", "Application-specific Binary Data", "application/octet-stream"),
        folia,
        FormatSchema::new("PDFFormat", "PDF", "application/pdf"),
        FormatSchema::new("ZIPFormat", "ZIP Archive", "application/zip"),
        FormatSchema::new("PngImageFormat", "PNG Image", "image/png"),
        FormatSchema::new("JpegImageFormat", "Jpeg Image", "image/jpeg"),
    ]
    .into_iter()
    .map(|schema| (schema.id.clone(), schema))
    .collect()
});

/// Builtin format schemas, keyed by id.
pub fn builtin_formats() -> &'static BTreeMap<String, FormatSchema> {
    &BUILTIN_FORMATS
}

/// Service-provided formats layered on top of the builtins.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    custom: BTreeMap<String, FormatSchema>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: FormatSchema) {
        if BUILTIN_FORMATS.contains_key(&schema.id) {
            warn!(format = %schema.id, "custom format shadows a builtin format");
        }
        debug!(format = %schema.id, attributes = schema.attributes.len(), "registered format");
        self.custom.insert(schema.id.clone(), schema);
    }

    pub fn with(mut self, schema: FormatSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn lookup(&self, id: &str) -> Option<&FormatSchema> {
        self.custom.get(id).or_else(|| BUILTIN_FORMATS.get(id))
    }

    pub fn resolve(&self, id: &str) -> Result<FormatSchema, ConfigurationError> {
        self.lookup(id)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFormat {
                format: id.to_string(),
            })
    }

    pub fn custom_ids(&self) -> impl Iterator<Item = &str> {
        self.custom.keys().map(String::as_str)
    }
}
