//! slotplan core: shared vocabulary
//!
//! Values and parameter snapshots, comparison operators, format schemas,
//! engine configuration, filename resolution and the error taxonomy used by
//! every other slotplan crate.

pub mod config;
pub mod error;
pub mod format;
pub mod naming;
pub mod operator;
pub mod value;

pub use config::{EngineConfig, ServiceIdentity};
pub use error::{ConfigurationError, EngineError, ParameterError, ValidationError};
pub use format::{builtin_formats, AttributeRule, FormatRegistry, FormatSchema, VALIDATION_ERROR_KEY};
pub use naming::{escapes_directory, resolve_filename, split_basename, NamingContext};
pub use operator::Operator;
pub use value::{ParameterValues, Value};

/// Engine version
pub const SLOTPLAN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Characters that may not appear in template ids
const RESERVED_ID_CHARS: [char; 2] = ['/', '.'];

/// Check a template id, which ends up embedded in link filenames.
pub fn validate_template_id(id: &str) -> Result<(), ConfigurationError> {
    if id.is_empty() || id.contains(RESERVED_ID_CHARS) {
        return Err(ConfigurationError::InvalidTemplateId {
            template_id: id.to_string(),
        });
    }
    Ok(())
}
