//! Configuration module for the skillkit runtime.
//!
//! This module provides layered configuration loading and validation for
//! dispatch settings, logging and attribute storage.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, SkillConfig, SpanEventConfig, StorageBackend,
    StorageConfig,
};
pub use validation::validate_config;
