//! File-to-template links
//!
//! A file `name` tagged to template `T` at sequence `N` is announced by an
//! empty sibling pointer `.name.INPUTTEMPLATE.T.N` (or `OUTPUTTEMPLATE` for
//! produced files). A [`LinkSet`] is the parsed view of those pointers plus
//! the metadata of the linked files.

use once_cell::sync::Lazy;
use regex::Regex;
use slotplan_core::{EngineError, FormatRegistry};
use slotplan_meta::{read_sidecar, MetadataRecord};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.(?P<file>.+)\.(?P<dir>INPUTTEMPLATE|OUTPUTTEMPLATE)\.(?P<tpl>[^./]+)\.(?P<seq>\d+)$")
        .expect("link pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkDirection {
    Input,
    Output,
}

impl LinkDirection {
    fn marker(&self) -> &'static str {
        match self {
            LinkDirection::Input => "INPUTTEMPLATE",
            LinkDirection::Output => "OUTPUTTEMPLATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLink {
    pub filename: String,
    pub template: String,
    pub sequence: u64,
    pub direction: LinkDirection,
}

impl FileLink {
    pub fn input(filename: impl Into<String>, template: impl Into<String>, sequence: u64) -> Self {
        Self {
            filename: filename.into(),
            template: template.into(),
            sequence,
            direction: LinkDirection::Input,
        }
    }

    pub fn output(filename: impl Into<String>, template: impl Into<String>, sequence: u64) -> Self {
        Self {
            direction: LinkDirection::Output,
            ..Self::input(filename, template, sequence)
        }
    }

    /// Parse a pointer name such as `.doc.txt.INPUTTEMPLATE.text.0`.
    pub fn parse(pointer: &str) -> Option<Self> {
        let caps = LINK_PATTERN.captures(pointer)?;
        let sequence = caps["seq"].parse().ok()?;
        let direction = match &caps["dir"] {
            "INPUTTEMPLATE" => LinkDirection::Input,
            _ => LinkDirection::Output,
        };
        Some(Self {
            filename: caps["file"].to_string(),
            template: caps["tpl"].to_string(),
            sequence,
            direction,
        })
    }

    pub fn pointer_name(&self) -> String {
        format!(
            ".{}.{}.{}.{}",
            self.filename,
            self.direction.marker(),
            self.template,
            self.sequence
        )
    }
}

impl fmt::Display for FileLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}#{}", self.filename, self.template, self.sequence)
    }
}

/// Pointer links found directly in `dir`, unsorted.
pub fn scan_links(dir: &Path) -> Result<Vec<FileLink>, EngineError> {
    let display = dir.display().to_string();
    let entries = std::fs::read_dir(dir).map_err(|e| EngineError::io(display.clone(), e))?;
    let mut links = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(display.clone(), e))?;
        let name = entry.file_name();
        if let Some(link) = name.to_str().and_then(FileLink::parse) {
            links.push(link);
        }
    }
    Ok(links)
}

/// The files of one project, tagged to templates, with their metadata.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: Vec<FileLink>,
    metadata: BTreeMap<String, MetadataRecord>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link: FileLink) {
        self.links.push(link);
    }

    pub fn with_link(mut self, filename: impl Into<String>, template: impl Into<String>, sequence: u64) -> Self {
        self.insert(FileLink::input(filename, template, sequence));
        self
    }

    pub fn with_metadata(mut self, filename: impl Into<String>, record: MetadataRecord) -> Self {
        self.metadata.insert(filename.into(), record);
        self
    }

    pub fn set_metadata(&mut self, filename: impl Into<String>, record: MetadataRecord) {
        self.metadata.insert(filename.into(), record);
    }

    pub fn links(&self) -> &[FileLink] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn metadata(&self, filename: &str) -> Option<&MetadataRecord> {
        self.metadata.get(filename)
    }

    /// `(sequence, filename)` of every input linked to `template`, ordered by sequence.
    pub fn matching(&self, template: &str) -> Vec<(u64, String)> {
        let mut found: Vec<(u64, String)> = self
            .links
            .iter()
            .filter(|l| l.direction == LinkDirection::Input && l.template == template)
            .map(|l| (l.sequence, l.filename.clone()))
            .collect();
        found.sort();
        found
    }

    pub fn max_sequence(&self, template: &str) -> Option<u64> {
        self.matching(template).into_iter().map(|(seq, _)| seq).max()
    }

    /// Scan `dir` for input links and load the sidecars of the linked files.
    pub fn scan(dir: &Path, formats: &FormatRegistry) -> Result<Self, EngineError> {
        let mut set = LinkSet::new();
        for link in scan_links(dir)? {
            if link.direction != LinkDirection::Input {
                continue;
            }
            let file = dir.join(&link.filename);
            if !file.exists() {
                warn!(link = %link, "link points at a missing file");
            }
            if !set.metadata.contains_key(&link.filename) {
                if let Some(record) = read_sidecar(&file, formats)? {
                    set.metadata.insert(link.filename.clone(), record);
                }
            }
            debug!(link = %link, "found input link");
            set.insert(link);
        }
        set.links.sort_by(|a, b| (&a.template, a.sequence).cmp(&(&b.template, b.sequence)));
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pointer() {
        let link = FileLink::parse(".doc.tok.txt.INPUTTEMPLATE.text.12").unwrap();
        assert_eq!(link.filename, "doc.tok.txt");
        assert_eq!(link.template, "text");
        assert_eq!(link.sequence, 12);
        assert_eq!(link.direction, LinkDirection::Input);
        assert_eq!(link.pointer_name(), ".doc.tok.txt.INPUTTEMPLATE.text.12");

        let out = FileLink::parse(".thumb_1.png.OUTPUTTEMPLATE.thumb.1").unwrap();
        assert_eq!(out.direction, LinkDirection::Output);

        assert!(FileLink::parse("doc.txt").is_none());
        assert!(FileLink::parse(".doc.txt.METADATA").is_none());
        assert!(FileLink::parse(".doc.txt.INPUTTEMPLATE.text.x").is_none());
    }

    #[test]
    fn test_matching_sorted_by_sequence() {
        let links = LinkSet::new()
            .with_link("c.png", "images", 3)
            .with_link("a.png", "images", 1)
            .with_link("doc.txt", "text", 0)
            .with_link("b.png", "images", 2);
        let matched = links.matching("images");
        assert_eq!(
            matched,
            vec![(1, "a.png".to_string()), (2, "b.png".to_string()), (3, "c.png".to_string())]
        );
        assert_eq!(links.max_sequence("images"), Some(3));
        assert_eq!(links.max_sequence("nothing"), None);
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["doc.txt", ".doc.txt.INPUTTEMPLATE.text.0", ".out.txt.OUTPUTTEMPLATE.result.0", "stray.bin"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let set = LinkSet::scan(dir.path(), &FormatRegistry::new()).unwrap();
        assert_eq!(set.links().len(), 1);
        assert_eq!(set.matching("text"), vec![(0, "doc.txt".to_string())]);
        assert!(set.metadata("doc.txt").is_none());
        assert_eq!(scan_links(dir.path()).unwrap().len(), 2);
    }
}
