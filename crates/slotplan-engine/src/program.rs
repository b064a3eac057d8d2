//! The resolved plan of a run
//!
//! A [`Program`] maps every output filename to the template producing it and
//! the input files it is derived from. It is what the dispatcher receives.

use serde::{Deserialize, Serialize};
use slotplan_core::EngineError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub template: String,
    /// Input filename → input template id
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "outputs")]
    entries: BTreeMap<String, ProgramEntry>,
    #[serde(rename = "matchedprofiles")]
    matched_profiles: Vec<usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output. When `filename` is already planned its inputs are
    /// merged and the first template is kept.
    pub fn add(&mut self, filename: impl Into<String>, template: impl Into<String>, inputs: BTreeMap<String, String>) {
        let filename = filename.into();
        match self.entries.get_mut(&filename) {
            Some(entry) => entry.inputs.extend(inputs),
            None => {
                self.entries.insert(
                    filename,
                    ProgramEntry {
                        template: template.into(),
                        inputs,
                    },
                );
            }
        }
    }

    pub fn record_profile(&mut self, index: usize) {
        if let Err(position) = self.matched_profiles.binary_search(&index) {
            self.matched_profiles.insert(position, index);
        }
    }

    /// Union with `other`, merging inputs of shared outputs.
    pub fn merge(&mut self, other: Program) {
        for (filename, entry) in other.entries {
            self.add(filename, entry.template, entry.inputs);
        }
        for index in other.matched_profiles {
            self.record_profile(index);
        }
    }

    pub fn get(&self, filename: &str) -> Option<&ProgramEntry> {
        self.entries.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of the profiles that matched, ascending.
    pub fn matched_profiles(&self) -> &[usize] {
        &self.matched_profiles
    }

    /// `(output filename, output template id)` pairs.
    pub fn output_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(filename, entry)| (filename.as_str(), entry.template.as_str()))
    }

    /// `(input filename, input template id)` pairs of one output.
    pub fn input_pairs(&self, filename: &str) -> Vec<(&str, &str)> {
        self.entries
            .get(filename)
            .map(|entry| {
                entry
                    .inputs
                    .iter()
                    .map(|(input, template)| (input.as_str(), template.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Serialize(e.to_string()))
    }

    pub fn from_json(path: &str, json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::parse(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(f, t)| (f.to_string(), t.to_string())).collect()
    }

    #[test]
    fn test_add_merges_inputs() {
        let mut program = Program::new();
        program.add("out.txt", "result", inputs(&[("a.txt", "text")]));
        program.add("out.txt", "other", inputs(&[("b.txt", "text")]));

        assert_eq!(program.len(), 1);
        let entry = program.get("out.txt").unwrap();
        assert_eq!(entry.template, "result");
        assert_eq!(program.input_pairs("out.txt"), vec![("a.txt", "text"), ("b.txt", "text")]);
        assert!(program.input_pairs("missing").is_empty());
    }

    #[test]
    fn test_merge_deduplicates_profiles() {
        let mut first = Program::new();
        first.add("doc.stats", "stats", inputs(&[("doc.txt", "text")]));
        first.record_profile(2);
        first.record_profile(0);

        let mut second = Program::new();
        second.add("doc.stats", "stats", inputs(&[("extra.txt", "text")]));
        second.add("error.log", "errorlog", BTreeMap::new());
        second.record_profile(0);
        second.record_profile(1);

        first.merge(second);
        assert_eq!(first.matched_profiles(), &[0, 1, 2]);
        assert_eq!(first.len(), 2);
        assert_eq!(first.get("doc.stats").unwrap().inputs.len(), 2);
        let pairs: Vec<(&str, &str)> = first.output_pairs().collect();
        assert_eq!(pairs, vec![("doc.stats", "stats"), ("error.log", "errorlog")]);
    }

    #[test]
    fn test_json_handoff() {
        let mut program = Program::new();
        program.add("doc.stats", "stats", inputs(&[("doc.txt", "text")]));
        program.record_profile(0);

        let json = program.to_json().unwrap();
        assert!(json.contains("\"matchedprofiles\""));
        assert!(json.contains("\"doc.stats\""));
        assert_eq!(Program::from_json("inline", &json).unwrap(), program);
    }
}
