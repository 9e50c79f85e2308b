//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, SkillConfig, StorageBackend};

/// Validates the entire configuration.
pub fn validate_config(config: &SkillConfig) -> ConfigResult<()> {
    validate_dispatch(config)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_dispatch(config: &SkillConfig) -> ConfigResult<()> {
    let dispatch = &config.dispatch;

    if dispatch.app_id.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::validation(
            "dispatch.app_id must not be empty when set",
        ));
    }

    match dispatch.attributes_table.as_deref() {
        Some("") => Err(ConfigError::validation(
            "dispatch.attributes_table must not be empty when set",
        )),
        Some(table) if config.storage.backend == StorageBackend::None => {
            Err(ConfigError::validation(format!(
                "dispatch.attributes_table is '{table}' but storage.backend is 'none'"
            )))
        }
        _ => Ok(()),
    }
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is 'file'",
        ));
    }
    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "logging.filters contains an empty module name: {module:?}"
        )));
    }
    Ok(())
}
