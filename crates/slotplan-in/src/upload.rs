//! Upload acceptance and sequence allocation
//!
//! The transport layer delivers a file for an input template; this module
//! decides the stored name, builds and validates its metadata and records the
//! link. Sequence numbers come from a [`SequenceAllocator`] that holds one
//! counter per `(project, template)`, seeded from the links already on disk,
//! so concurrent uploads to the same template never share a number.

use crate::links::{scan_links, FileLink, LinkDirection};
use crate::template::InputTemplate;
use slotplan_core::{resolve_filename, EngineError, NamingContext, ParameterValues, ValidationError};
use slotplan_meta::{atomic_write_file, write_sidecar, MetadataRecord};
use slotplan_params::process_parameters;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Characters a stored filename may not contain
const DISALLOWED_FILENAME_CHARS: [char; 15] =
    ['/', '&', '|', '<', '>', ';', '"', '\'', '`', '{', '}', '\n', '\r', '\u{8}', '\t'];

#[derive(Debug, Default)]
pub struct SequenceAllocator {
    counters: Mutex<HashMap<(String, String), u64>>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number for `template` in `project`, whose inputs live in `dir`.
    ///
    /// Unique templates always get 0. Others get one more than the highest
    /// number seen so far, starting at 1.
    pub fn next(&self, project: &str, template: &InputTemplate, dir: &Path) -> Result<u64, EngineError> {
        if template.unique {
            return Ok(0);
        }
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (project.to_string(), template.id.clone());
        let current = match counters.get(&key) {
            Some(current) => *current,
            None => scan_links(dir)?
                .into_iter()
                .filter(|l| l.direction == LinkDirection::Input && l.template == template.id)
                .map(|l| l.sequence)
                .max()
                .unwrap_or(0),
        };
        let next = current + 1;
        counters.insert(key, next);
        debug!(project, template = %template.id, sequence = next, "allocated sequence number");
        Ok(next)
    }

    /// Forget the counter of a template, forcing a rescan on next use.
    pub fn reset(&self, project: &str, template_id: &str) {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters.remove(&(project.to_string(), template_id.to_string()));
    }
}

/// One file offered for an input template
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub project: &'a str,
    pub template: &'a InputTemplate,
    /// Name the file was submitted under
    pub filename: &'a str,
    /// Raw values for the template's parameters
    pub parameters: &'a ParameterValues,
}

#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    pub filename: String,
    pub sequence: u64,
    pub link: FileLink,
    pub metadata: MetadataRecord,
}

/// Stored filename for an upload.
pub fn stored_filename(request: &UploadRequest<'_>, values: &ParameterValues, sequence: u64) -> String {
    let template = request.template;
    let submitted = request.filename.rsplit('/').next().unwrap_or(request.filename);
    let mut filename = match &template.filename {
        Some(pattern) => {
            let ctx = NamingContext::new(values)
                .with_project(request.project)
                .with_sequence(sequence, template.unique)
                .with_input_filename(submitted);
            resolve_filename(pattern, &ctx)
        }
        None => submitted.to_string(),
    };
    if let Some(extension) = &template.extension {
        let suffix = format!(".{}", extension);
        if !filename.ends_with(&suffix) {
            filename.push_str(&suffix);
        }
    }
    filename
}

/// Reason a stored filename is refused, if any.
fn filename_problem(filename: &str) -> Option<&'static str> {
    if filename.is_empty() || filename.starts_with('.') {
        Some("invalid filename")
    } else if filename.contains(DISALLOWED_FILENAME_CHARS) {
        Some("filename contains invalid symbols, do not use / & | < > ; ' ` \" { } or control characters")
    } else {
        None
    }
}

/// Validate an upload and record it in `dir`.
///
/// Nothing is written unless the parameters and the resulting metadata are
/// valid. A unique template accepts a single file; a second one is refused
/// until the first is removed. The sidecar is written before the link
/// pointer and removed again if the pointer cannot be written, so a link
/// never exists without its metadata.
pub fn accept_upload(
    dir: &Path,
    allocator: &SequenceAllocator,
    request: UploadRequest<'_>,
) -> Result<AcceptedUpload, EngineError> {
    let template = request.template;

    if template.unique {
        let existing = scan_links(dir)?
            .into_iter()
            .find(|l| l.direction == LinkDirection::Input && l.template == template.id);
        if let Some(existing) = existing {
            warn!(template = %template.id, existing = %existing.filename, "second file for unique template refused");
            return Err(ValidationError::new(
                request.filename,
                format!(
                    "a file was already submitted for `{}` ({}), only one is allowed; delete it first",
                    template.id, existing.filename
                ),
            )
            .into());
        }
    }

    let report = process_parameters(&template.parameters, request.parameters);
    let values = report.into_values()?;

    let attributes = values
        .iter()
        .map(|(id, value)| (id.clone(), value.clone()))
        .collect();
    let metadata = MetadataRecord::new(template.format.clone())
        .with_attributes(attributes)
        .with_constraints(template.constraints.clone())
        .with_input_template(template.id.clone());

    let sequence = allocator.next(request.project, template, dir)?;
    let filename = stored_filename(&request, &values, sequence);
    if let Some(reason) = filename_problem(&filename) {
        warn!(template = %template.id, filename = %filename, reason, "upload rejected");
        return Err(ValidationError::new(filename, reason).into());
    }

    let metadata = match metadata.into_validated(&filename) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!(template = %template.id, filename = %filename, reason = %err.reason, "upload rejected");
            return Err(err.into());
        }
    };

    let link = FileLink::input(filename.clone(), template.id.clone(), sequence);
    let sidecar = write_sidecar(&dir.join(&filename), &metadata)?;
    let pointer = dir.join(link.pointer_name());
    if let Err(e) = atomic_write_file(&pointer, b"") {
        if let Err(cleanup) = std::fs::remove_file(&sidecar) {
            warn!(path = %sidecar.display(), error = %cleanup, "could not remove orphaned sidecar");
        }
        return Err(EngineError::io(pointer.display().to_string(), e));
    }
    info!(template = %template.id, filename = %filename, sequence, "accepted upload");

    Ok(AcceptedUpload {
        filename,
        sequence,
        link,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotplan_core::{builtin_formats, AttributeRule, FormatSchema};
    use slotplan_meta::sidecar_path;
    use slotplan_params::ParameterDeclaration;

    fn images() -> InputTemplate {
        InputTemplate::new("images", builtin_formats()["PngImageFormat"].clone())
            .multi()
            .with_extension("png")
    }

    #[test]
    fn test_sequence_seeded_from_links() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".a.png.INPUTTEMPLATE.images.4"), b"").unwrap();
        let allocator = SequenceAllocator::new();
        let template = images();
        assert_eq!(allocator.next("p", &template, dir.path()).unwrap(), 5);
        assert_eq!(allocator.next("p", &template, dir.path()).unwrap(), 6);
        assert_eq!(allocator.next("other", &template, dir.path()).unwrap(), 5);

        let unique = InputTemplate::new("text", builtin_formats()["PlainTextFormat"].clone());
        assert_eq!(allocator.next("p", &unique, dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_allocations_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = SequenceAllocator::new();
        let template = images();
        let mut numbers: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| allocator.next("p", &template, dir.path()).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        numbers.sort();
        assert_eq!(numbers, (1..=8).collect::<Vec<u64>>());
    }

    #[test]
    fn test_accept_upload_writes_link_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = SequenceAllocator::new();
        let template = images();
        let params = ParameterValues::new();

        let accepted = accept_upload(
            dir.path(),
            &allocator,
            UploadRequest {
                project: "p",
                template: &template,
                filename: "uploads/scan",
                parameters: &params,
            },
        )
        .unwrap();

        assert_eq!(accepted.filename, "scan.png");
        assert_eq!(accepted.sequence, 1);
        assert!(dir.path().join(".scan.png.INPUTTEMPLATE.images.1").exists());
        assert!(dir.path().join(".scan.png.METADATA").exists());
    }

    #[test]
    fn test_fixed_filename_pattern() {
        let template = InputTemplate::new("pages", builtin_formats()["PlainTextFormat"].clone())
            .multi()
            .with_filename("$PROJECT-page$SEQNR.txt");
        let params = ParameterValues::new();
        let request = UploadRequest {
            project: "book",
            template: &template,
            filename: "whatever.doc",
            parameters: &params,
        };
        assert_eq!(stored_filename(&request, &params, 7), "book-page7.txt");
    }

    #[test]
    fn test_invalid_upload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = SequenceAllocator::new();
        let strict = FormatSchema::new("CsvLike", "CSV-ish", "text/csv")
            .with_attribute("encoding", AttributeRule::required());
        let template = InputTemplate::new("table", strict)
            .with_parameter(ParameterDeclaration::string("delimiter", "Delimiter"));
        let params = ParameterValues::new().with("delimiter", ";");

        let result = accept_upload(
            dir.path(),
            &allocator,
            UploadRequest {
                project: "p",
                template: &template,
                filename: "data.csv",
                parameters: &params,
            },
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parameter_errors_abort_upload() {
        let dir = tempfile::tempdir().unwrap();
        let template = InputTemplate::new("text", builtin_formats()["PlainTextFormat"].clone())
            .with_parameter(ParameterDeclaration::choice("encoding", "Encoding", &["utf-8", "latin1"]).required());
        let params = ParameterValues::new();
        let result = accept_upload(
            dir.path(),
            &SequenceAllocator::new(),
            UploadRequest {
                project: "p",
                template: &template,
                filename: "doc.txt",
                parameters: &params,
            },
        );
        assert!(matches!(result, Err(EngineError::Parameters(errors)) if errors.len() == 1));
    }

    fn text() -> InputTemplate {
        InputTemplate::new("text", builtin_formats()["PlainTextFormat"].clone()).with_extension("txt")
    }

    fn upload(
        dir: &Path,
        allocator: &SequenceAllocator,
        template: &InputTemplate,
        filename: &str,
    ) -> Result<AcceptedUpload, EngineError> {
        let params = ParameterValues::new();
        accept_upload(
            dir,
            allocator,
            UploadRequest {
                project: "p",
                template,
                filename,
                parameters: &params,
            },
        )
    }

    #[test]
    fn test_unique_template_takes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = SequenceAllocator::new();
        let template = text();

        let first = upload(dir.path(), &allocator, &template, "a.txt").unwrap();
        assert_eq!(first.sequence, 0);

        for name in ["b.txt", "a.txt"] {
            let err = upload(dir.path(), &allocator, &template, name).unwrap_err();
            let EngineError::Validation(err) = err else {
                panic!("expected a validation error, got {:?}", err);
            };
            assert!(err.reason.contains("already submitted"));
        }
        let links = scan_links(dir.path()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].filename, "a.txt");
        assert!(!dir.path().join(".b.txt.METADATA").exists());
    }

    #[test]
    fn test_filename_with_shell_symbols_refused() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = SequenceAllocator::new();
        let template = text();

        for name in ["x;rm -rf ~|`id`.txt", "a&b.txt", "{x}.txt", "tab\there.txt", "quote'.txt"] {
            let result = upload(dir.path(), &allocator, &template, name);
            assert!(matches!(result, Err(EngineError::Validation(_))), "{:?} was accepted", name);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_symbols_from_parameter_substitution_refused() {
        let dir = tempfile::tempdir().unwrap();
        let template = InputTemplate::new("text", builtin_formats()["PlainTextFormat"].clone())
            .with_filename("$author.txt")
            .with_parameter(ParameterDeclaration::string("author", "Author"));
        let params = ParameterValues::new().with("author", "../../etc/passwd");
        let result = accept_upload(
            dir.path(),
            &SequenceAllocator::new(),
            UploadRequest {
                project: "p",
                template: &template,
                filename: "doc.txt",
                parameters: &params,
            },
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_no_link_without_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = sidecar_path(&dir.path().join("doc.txt"));
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("occupied"), b"").unwrap();

        let result = upload(dir.path(), &SequenceAllocator::new(), &text(), "doc.txt");
        assert!(matches!(result, Err(EngineError::Io { .. })));
        assert!(!dir.path().join(".doc.txt.INPUTTEMPLATE.text.0").exists());
        assert!(scan_links(dir.path()).unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
