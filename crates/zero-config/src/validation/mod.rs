//! Full configuration validation.
//!
//! Validates numeric ranges for every section and collects all errors
//! into a single `ConfigError`.

mod helpers;
mod sections;


use crate::schema::ZeroConfig;
use zero_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ZeroConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    sections::validate_llm(&mut errors, config);
    sections::validate_retry(&mut errors, config);
    sections::validate_agent(&mut errors, config);
    sections::validate_tools(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
