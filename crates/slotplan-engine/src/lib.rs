//! slotplan-engine: profiles and program resolution
//!
//! ```text
//! service.yaml ──► ServiceDefinition ──► Engine { profiles, parameters }
//!                                           │
//! input/ links + sidecars ──► LinkSet ──────┤
//! raw parameters ──► ParameterReport ───────┤
//!                                           ▼
//!                         Resolution { Program, records, rejected }
//! ```
//!
//! Each profile is matched against the linked inputs; every matching profile
//! generates its outputs and the results are folded into one [`Program`].

pub mod definition;
pub mod engine;
pub mod profile;
pub mod program;
pub mod project;

pub use definition::{load_engine, OutputEntrySpec, ProfileSpec, ServiceDefinition};
pub use engine::{Engine, Resolution};
pub use profile::{error_log_template, Profile, ProfileMatch, RunContext, ERROR_LOG_FILENAME, ERROR_LOG_ID};
pub use program::{Program, ProgramEntry};
pub use project::{ProjectDir, INPUT_DIR, OUTPUT_DIR};
