//! slotplan-out: output templates and generation
//!
//! An [`OutputTemplate`] names one category of produced file. Given the run's
//! linked inputs and parameters it yields one [`GeneratedOutput`] per parent
//! input file (or a single one for standalone outputs), each with a name, a
//! validated metadata record and its provenance.
//!
//! ```
//! use slotplan_core::{builtin_formats, EngineConfig, ParameterValues};
//! use slotplan_in::{InputTemplate, LinkSet};
//! use slotplan_out::{GenerationContext, OutputTemplate};
//!
//! let text = builtin_formats()["PlainTextFormat"].clone();
//! let inputs = [InputTemplate::new("text", text.clone())];
//! let links = LinkSet::new().with_link("doc.txt", "text", 0);
//! let stats = OutputTemplate::new("stats", text).with_parent("text").with_extension("stats");
//!
//! let ctx = GenerationContext {
//!     inputs: &inputs,
//!     links: &links,
//!     parameters: &ParameterValues::new(),
//!     config: &EngineConfig::default(),
//!     project: "demo",
//! };
//! let outputs = stats.generate(&ctx);
//! assert_eq!(outputs[0].as_ref().unwrap().filename, "doc.stats");
//! ```

pub mod metaop;
pub mod output;

pub use metaop::{apply_metafields, MetaContext, MetaFieldSpec, MetaOp, RelevantInput};
pub use output::{
    GeneratedOutput, GenerationContext, OutputTemplate, OutputTemplateSpec, RemoveExtensions, RemoveExtensionsSpec,
};
