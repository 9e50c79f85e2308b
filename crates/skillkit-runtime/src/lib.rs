//! Skillkit Runtime - Orchestration layer for skillkit.
//!
//! This crate provides:
//! - Layered configuration loading (`SkillConfig`, `ConfigLoader`)
//! - Logging configuration (`LoggingBuilder`)
//! - A file-backed attribute store (`JsonFileStore`)
//! - The per-request orchestrator (`SkillRuntime`), usable directly or as a
//!   `tower::Service`
//!
//! ```ignore
//! use skillkit_runtime::{ConfigLoader, SkillRuntime, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let mut runtime = SkillRuntime::from_config(&config).await?;
//!     runtime.register(my_skill::handlers())?;
//!
//!     let response = runtime.handle_json(&request_text).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod store;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, LogFormat, LogLevel, LogOutput, LoggingConfig,
    SkillConfig, StorageBackend, StorageConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::SkillRuntime;
pub use store::JsonFileStore;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
