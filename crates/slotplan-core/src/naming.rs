//! Filename resolution
//!
//! Substitutes `$`-prefixed variables in a filename pattern. Parameters go
//! first, longest id first so `$ab` is never clobbered by `$a`; then metadata
//! attributes (outputs only), the input filename parts, `$PROJECT`, and for
//! non-unique templates `$SEQNR` plus the legacy bare `#`.
use crate::value::{ParameterValues, Value};
use std::collections::BTreeMap;
use std::path::{Component, Path};

pub const VAR_INPUTFILENAME: &str = "$INPUTFILENAME";
pub const VAR_INPUTSTRIPPEDFILENAME: &str = "$INPUTSTRIPPEDFILENAME";
pub const VAR_INPUTEXTENSION: &str = "$INPUTEXTENSION";
pub const VAR_PROJECT: &str = "$PROJECT";
pub const VAR_SEQNR: &str = "$SEQNR";

/// Variable bindings available while resolving one filename.
#[derive(Debug, Clone, Copy)]
pub struct NamingContext<'a> {
    pub parameters: &'a ParameterValues,
    pub attributes: Option<&'a BTreeMap<String, Value>>,
    pub project: Option<&'a str>,
    pub sequence: u64,
    pub unique: bool,
    pub input_filename: Option<&'a str>,
}

impl<'a> NamingContext<'a> {
    pub fn new(parameters: &'a ParameterValues) -> Self {
        Self {
            parameters,
            attributes: None,
            project: None,
            sequence: 0,
            unique: true,
            input_filename: None,
        }
    }

    pub fn with_attributes(mut self, attributes: &'a BTreeMap<String, Value>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_project(mut self, project: &'a str) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_sequence(mut self, sequence: u64, unique: bool) -> Self {
        self.sequence = sequence;
        self.unique = unique;
        self
    }

    pub fn with_input_filename(mut self, filename: &'a str) -> Self {
        self.input_filename = Some(filename);
        self
    }
}

/// Split the basename of `filename` at its first dot into stem and extension.
///
/// `dir/doc.tok.xml` gives `("doc", "tok.xml")`; a name without dots has an
/// empty extension.
pub fn split_basename(filename: &str) -> (&str, &str) {
    let basename = filename.rsplit('/').next().unwrap_or(filename);
    match basename.split_once('.') {
        Some((stem, extension)) => (stem, extension),
        None => (basename, ""),
    }
}

/// Whether a resolved filename would land outside the directory it is joined to.
///
/// Empty names, absolute paths and any `..` component escape; plain
/// subdirectories do not.
pub fn escapes_directory(filename: &str) -> bool {
    filename.is_empty()
        || Path::new(filename)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

fn substitute_longest_first<'v>(
    mut filename: String,
    bindings: impl Iterator<Item = (&'v String, &'v Value)>,
) -> String {
    let mut bindings: Vec<(&String, &Value)> = bindings.collect();
    bindings.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    for (id, value) in bindings {
        let variable = format!("${}", id);
        if filename.contains(&variable) {
            filename = filename.replace(&variable, &value.to_string());
        }
    }
    filename
}

/// Resolve a filename pattern against the given bindings.
pub fn resolve_filename(template: &str, ctx: &NamingContext<'_>) -> String {
    if !template.contains('$') && !template.contains('#') {
        return template.to_string();
    }

    let mut filename = substitute_longest_first(template.to_string(), ctx.parameters.iter());

    if let Some(attributes) = ctx.attributes {
        if filename.contains('$') {
            filename = substitute_longest_first(filename, attributes.iter());
        }
    }

    if let Some(input) = ctx.input_filename {
        let basename = input.rsplit('/').next().unwrap_or(input);
        let (stem, extension) = split_basename(input);
        filename = filename
            .replace(VAR_INPUTSTRIPPEDFILENAME, stem)
            .replace(VAR_INPUTFILENAME, basename)
            .replace(VAR_INPUTEXTENSION, extension);
    }

    if let Some(project) = ctx.project {
        filename = filename.replace(VAR_PROJECT, project);
    }

    if !ctx.unique {
        let sequence = ctx.sequence.to_string();
        filename = filename.replace(VAR_SEQNR, &sequence).replace('#', &sequence);
    }

    filename
}
