//! slotplan meta: metadata records and their persistence
//!
//! * [`MetadataRecord`] - format schema, attributes, provenance and
//!   constraints, with a memoised validation verdict
//! * [`Provenance`] - service identity, output template, timestamp, inputs
//!   and parameter snapshot
//! * [`Sidecar`] - the JSON form stored next to each file as `.name.METADATA`

pub mod fs_atomic;
pub mod provenance;
pub mod record;
pub mod sidecar;

pub use fs_atomic::atomic_write_file;
pub use provenance::{Provenance, ProvenanceInput};
pub use record::MetadataRecord;
pub use sidecar::{read_sidecar, sidecar_path, write_sidecar, AttributeEntry, Sidecar, SIDECAR_SUFFIX};
