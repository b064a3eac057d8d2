//! Project directories
//!
//! A project keeps its uploads in `input/` and the tool's results in
//! `output/`. Both carry the link pointers and metadata sidecars the engine
//! reads and writes.

use crate::engine::{Engine, Resolution};
use slotplan_core::{escapes_directory, EngineError, ParameterValues, ValidationError};
use slotplan_in::{accept_upload, AcceptedUpload, InputTemplate, LinkSet, SequenceAllocator, UploadRequest};
use slotplan_meta::write_sidecar;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const INPUT_DIR: &str = "input";
pub const OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDir {
    root: PathBuf,
    name: String,
}

impl ProjectDir {
    /// Open the project rooted at `root`; its name is the last path component.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { root, name }
    }

    /// Open `root`, creating the input and output directories when missing.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let project = Self::open(root);
        for dir in [project.input_dir(), project.output_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| EngineError::io(dir.display().to_string(), e))?;
        }
        Ok(project)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Linked inputs and their metadata.
    pub fn scan_inputs(&self, engine: &Engine) -> Result<LinkSet, EngineError> {
        LinkSet::scan(&self.input_dir(), &engine.config().formats)
    }

    pub fn upload(
        &self,
        allocator: &SequenceAllocator,
        template: &InputTemplate,
        filename: &str,
        parameters: &ParameterValues,
    ) -> Result<AcceptedUpload, EngineError> {
        accept_upload(
            &self.input_dir(),
            allocator,
            UploadRequest {
                project: &self.name,
                template,
                filename,
                parameters,
            },
        )
    }

    /// Scan the inputs, validate `raw` parameters and resolve the program.
    pub fn resolve(&self, engine: &Engine, raw: &ParameterValues) -> Result<Resolution, EngineError> {
        let links = self.scan_inputs(engine)?;
        engine.start(&links, raw, &self.name)
    }

    /// Write the sidecar of every planned output into `output/`.
    pub fn write_outputs(&self, resolution: &Resolution) -> Result<Vec<PathBuf>, EngineError> {
        let output_dir = self.output_dir();
        if let Some(filename) = resolution.records.keys().find(|f| escapes_directory(f)) {
            warn!(project = %self.name, filename = %filename, "refusing to write outside the output directory");
            return Err(ValidationError::new(filename.clone(), "output filename leaves the output directory").into());
        }
        let mut written = Vec::with_capacity(resolution.records.len());
        for (filename, record) in &resolution.records {
            let file = output_dir.join(filename);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent.display().to_string(), e))?;
            }
            written.push(write_sidecar(&file, record)?);
        }
        info!(project = %self.name, count = written.len(), "wrote output metadata");
        Ok(written)
    }
}
