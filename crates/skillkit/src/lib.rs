//! # Skillkit
//!
//! State-scoped request dispatch for voice assistant skills.
//!
//! Every inbound request resolves to one composite event name built from
//! the request (`NewSession`, an intent name, `SessionEndedRequest`) and the
//! conversation state stored under the `STATE` session attribute. Handlers
//! are registered in groups, optionally scoped to a state, and can chain to
//! each other or to the built-in response handlers (`:tell`, `:ask`, ...).
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────────────────┐
//! │ SkillRuntime │────▶│ SkillDispatcher  │────▶│ "NewSession"             │
//! │ (per skill)  │     │ (per request)    │────▶│ "AnswerIntentPlaying"    │──▶ :ask ──▶ :responseReady
//! └──────────────┘     └──────────────────┘────▶│ "UnhandledPlaying"       │
//!                                               └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skillkit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let mut runtime = SkillRuntime::from_config(&config).await?;
//!     runtime.register([
//!         HandlerGroup::new().on("NewSession", |ctx: HandlerContext| async move {
//!             ctx.set_state("Playing");
//!             ctx.ask("Ready?", "Are you ready?").await
//!         }),
//!         HandlerGroup::for_state("Playing").on("Unhandled", |ctx: HandlerContext| async move {
//!             ctx.ask("Say yes or no.", "Yes or no?").await
//!         }),
//!     ])?;
//!
//!     let response = runtime.handle_json(&body).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use skillkit_core as core;
pub use skillkit_framework as framework;
pub use skillkit_runtime as runtime;

pub use skillkit_runtime::logging;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use skillkit::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use skillkit_runtime::{ConfigLoader, SkillConfig, SkillRuntime, logging};

    // Handlers and dispatch
    pub use skillkit_framework::{
        DispatchConfig, HandlerContext, HandlerGroup, HandlerResult, SkillDispatcher,
    };

    // Request and response model
    pub use skillkit_core::{
        Attributes, AttributeStore, Card, DispatchError, Image, MemoryStore, Request,
        RequestEnvelope, ResponseBuilder, ResponseEnvelope, STATE_KEY,
    };
}
