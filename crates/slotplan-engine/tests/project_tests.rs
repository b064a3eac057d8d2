//! Upload, resolve and write against a project directory on disk.

use slotplan_core::{EngineError, ParameterValues, Value};
use slotplan_engine::{load_engine, Engine, ProjectDir, ERROR_LOG_FILENAME};
use slotplan_in::{scan_links, SequenceAllocator};
use slotplan_meta::{read_sidecar, sidecar_path};

fn fixture(name: &str) -> String {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = std::path::Path::new(&manifest_dir).parent().unwrap().parent().unwrap();
    workspace_root
        .join("testing/fixtures/services")
        .join(name)
        .to_string_lossy()
        .to_string()
}

fn tokeniser() -> Engine {
    load_engine(&fixture("tokeniser.yaml")).unwrap()
}

fn upload_text(project: &ProjectDir, engine: &Engine, allocator: &SequenceAllocator, name: &str, language: &str) -> u64 {
    let template = engine.profiles()[0].input("text").unwrap();
    std::fs::write(project.input_dir().join(name), "Some words here.").unwrap();
    let accepted = project
        .upload(allocator, template, name, &ParameterValues::new().with("language", language))
        .unwrap();
    assert_eq!(accepted.filename, name);
    accepted.sequence
}

// =============================================================================
// Uploads
// =============================================================================

#[test]
fn test_uploads_get_increasing_sequence_numbers() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    let allocator = SequenceAllocator::new();

    assert_eq!(upload_text(&project, &engine, &allocator, "chapter1.txt", "en"), 1);
    assert_eq!(upload_text(&project, &engine, &allocator, "chapter2.txt", "nl"), 2);

    // A fresh allocator picks up from the links on disk.
    let restarted = SequenceAllocator::new();
    assert_eq!(upload_text(&project, &engine, &restarted, "chapter3.txt", "en"), 3);

    let links = project.scan_inputs(&engine).unwrap();
    assert_eq!(links.matching("text").len(), 3);
    assert_eq!(
        links.metadata("chapter2.txt").unwrap().get("language"),
        Some(&Value::text("nl"))
    );
}

#[test]
fn test_upload_without_required_parameter_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    let template = engine.profiles()[0].input("text").unwrap();

    let err = project
        .upload(&SequenceAllocator::new(), template, "chapter1.txt", &ParameterValues::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::Parameters(ref errors) if errors[0].parameter_id == "language"));
    assert!(project.scan_inputs(&engine).unwrap().is_empty());
}

#[test]
fn test_fixed_filename_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    let template = engine.profiles()[0].input("abbreviations").unwrap();

    let accepted = project
        .upload(&SequenceAllocator::new(), template, "my-list.lst", &ParameterValues::new())
        .unwrap();
    assert_eq!(accepted.filename, "abbreviations.txt");
    assert_eq!(accepted.sequence, 0);
    assert!(sidecar_path(&project.input_dir().join("abbreviations.txt")).exists());

    let again = project.upload(&SequenceAllocator::new(), template, "other.lst", &ParameterValues::new());
    assert!(matches!(again, Err(EngineError::Validation(_))));
    let linked: Vec<String> = scan_links(&project.input_dir()).unwrap().into_iter().map(|l| l.filename).collect();
    assert_eq!(linked, vec!["abbreviations.txt".to_string()]);
}

// =============================================================================
// Resolution over uploaded inputs
// =============================================================================

#[test]
fn test_resolve_copies_upload_metadata() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    let allocator = SequenceAllocator::new();
    upload_text(&project, &engine, &allocator, "chapter1.txt", "en");
    upload_text(&project, &engine, &allocator, "chapter2.txt", "nl");

    let resolution = project
        .resolve(&engine, &ParameterValues::new().with("lowercase", "yes"))
        .unwrap();
    assert_eq!(resolution.command_line, vec!["-l".to_string()]);
    assert!(resolution.rejected.is_empty());

    let program = &resolution.program;
    assert_eq!(program.input_pairs("chapter1.tok"), vec![("chapter1.txt", "text")]);
    assert_eq!(program.input_pairs("chapter2.tok"), vec![("chapter2.txt", "text")]);
    assert!(program.contains(ERROR_LOG_FILENAME));
    assert!(!program.contains("abbreviations.stats"));

    let record = &resolution.records["chapter2.tok"];
    assert_eq!(record.get("language"), Some(&Value::text("nl")));
    assert_eq!(record.get("encoding"), Some(&Value::text("utf-8")));
    assert_eq!(record.get("case"), Some(&Value::text("lower")));

    let provenance = record.provenance().unwrap();
    assert_eq!(provenance.serviceid, "tokeniser");
    assert_eq!(provenance.inputfiles.len(), 1);
    assert_eq!(provenance.inputfiles[0].filename, "chapter2.txt");
    assert_eq!(provenance.inputfiles[0].metadata.inputtemplate.as_deref(), Some("text"));
}

#[test]
fn test_invalid_output_is_rejected_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    let allocator = SequenceAllocator::new();
    upload_text(&project, &engine, &allocator, "chapter1.txt", "en");
    upload_text(&project, &engine, &allocator, "chapter2.txt", "fr");

    let resolution = project.resolve(&engine, &ParameterValues::new()).unwrap();
    assert!(resolution.program.contains("chapter1.tok"));
    assert!(!resolution.program.contains("chapter2.tok"));
    assert_eq!(resolution.rejected.len(), 1);
    assert_eq!(resolution.rejected[0].filename, "chapter2.tok");
    assert!(resolution.records["chapter1.tok"].get("case").is_none());
}

#[test]
fn test_optional_input_enables_its_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    let allocator = SequenceAllocator::new();
    upload_text(&project, &engine, &allocator, "chapter1.txt", "en");

    let before = project.resolve(&engine, &ParameterValues::new()).unwrap();
    assert_eq!(before.matches[0].optional_absent, vec!["abbreviations".to_string()]);

    let template = engine.profiles()[0].input("abbreviations").unwrap();
    project
        .upload(&allocator, template, "abbreviations.txt", &ParameterValues::new())
        .unwrap();

    let after = project.resolve(&engine, &ParameterValues::new()).unwrap();
    assert!(after.matches[0].optional_absent.is_empty());
    assert_eq!(
        after.program.input_pairs("abbreviations.stats"),
        vec![("abbreviations.txt", "abbreviations")]
    );

    // The unique abbreviation list is relevant to every tokenised document.
    let inputs: Vec<&str> = after.records["chapter1.tok"]
        .provenance()
        .unwrap()
        .inputfiles
        .iter()
        .map(|input| input.filename.as_str())
        .collect();
    assert_eq!(inputs, vec!["chapter1.txt", "abbreviations.txt"]);
}

#[test]
fn test_forbidden_parameter_combination_aborts() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    upload_text(&project, &engine, &SequenceAllocator::new(), "chapter1.txt", "en");

    let raw = ParameterValues::new().with("sentences", true).with("verbatim", true);
    let err = project.resolve(&engine, &raw).unwrap_err();
    match err {
        EngineError::Parameters(errors) => {
            let ids: Vec<&str> = errors.iter().map(|e| e.parameter_id.as_str()).collect();
            assert!(ids.contains(&"sentences"));
            assert!(ids.contains(&"verbatim"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

// =============================================================================
// Writing output metadata
// =============================================================================

#[test]
fn test_written_sidecars_read_back() {
    let tmp = tempfile::tempdir().unwrap();
    let project = ProjectDir::create(tmp.path().join("book")).unwrap();
    let engine = tokeniser();
    upload_text(&project, &engine, &SequenceAllocator::new(), "chapter1.txt", "en");

    let resolution = project.resolve(&engine, &ParameterValues::new()).unwrap();
    let written = project.write_outputs(&resolution).unwrap();
    assert_eq!(written.len(), resolution.records.len());

    let file = project.output_dir().join("chapter1.tok");
    assert!(sidecar_path(&file).exists());
    let read = read_sidecar(&file, &engine.config().formats).unwrap().unwrap();
    let planned = &resolution.records["chapter1.tok"];
    assert_eq!(read.format().id, "TokenisedFormat");
    assert_eq!(read.attributes(), planned.attributes());
    assert_eq!(read.provenance(), planned.provenance());

    let program_json = resolution.program.to_json().unwrap();
    assert!(program_json.contains("\"matchedprofiles\""));
    assert!(program_json.contains("chapter1.tok"));
}
