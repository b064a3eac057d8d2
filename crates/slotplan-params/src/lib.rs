//! slotplan params: typed parameter declarations
//!
//! Declarations come from the service definition and are shared read-only.
//! [`process_parameters`] binds the raw input of one run to them, returning a
//! [`ParameterReport`] with per-parameter errors, the value snapshot and the
//! compiled command line.
//!
//! # Example
//!
//! ```
//! use slotplan_core::ParameterValues;
//! use slotplan_params::{process_parameters, ParameterDeclaration};
//!
//! let declarations = vec![
//!     ParameterDeclaration::integer("beam", "Beam size", 1, 10).with_flag("-b"),
//! ];
//! let report = process_parameters(&declarations, &ParameterValues::new().with("beam", "4"));
//! assert!(!report.has_errors());
//! assert_eq!(report.command_line, vec!["-b 4".to_string()]);
//! ```

pub mod declaration;
pub mod group;
pub mod process;

pub use declaration::{Choice, ParameterDeclaration, ParameterKind, Pattern, MSG_MANDATORY, MSG_UNINTERPRETABLE};
pub use group::{ParameterGroup, ParameterSet};
pub use process::{process_parameters, BoundParameter, ParameterReport};
