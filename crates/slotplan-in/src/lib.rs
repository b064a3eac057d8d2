//! slotplan in: accepted inputs
//!
//! * [`InputTemplate`] - one input slot of a profile and its matching rule
//! * [`LinkSet`] / [`FileLink`] - the `.name.INPUTTEMPLATE.T.N` link convention
//! * [`SequenceAllocator`] / [`accept_upload`] - storing a new upload

pub mod links;
pub mod template;
pub mod upload;

pub use links::{scan_links, FileLink, LinkDirection, LinkSet};
pub use template::{InputTemplate, InputTemplateSpec};
pub use upload::{accept_upload, stored_filename, AcceptedUpload, SequenceAllocator, UploadRequest};
