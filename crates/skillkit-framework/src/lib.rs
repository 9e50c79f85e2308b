//! # Skillkit Framework
//!
//! The dispatch engine of skillkit.
//!
//! This layer provides:
//! - [`Handler`] for async functions taking a [`HandlerContext`]
//! - [`HandlerGroup`] and [`Registry`] for state-scoped handler tables
//! - [`SkillDispatcher`], which resolves one incoming request to its
//!   listeners, with the `Unhandled` fallback
//! - Built-in response listeners (`:tell`, `:ask`, `:responseReady`,
//!   `:saveState`, ...) that integrators may override
//!
//! ```rust,ignore
//! use skillkit_framework::{DispatchConfig, HandlerGroup, SkillDispatcher};
//!
//! let dispatcher = SkillDispatcher::builder(envelope)
//!     .config(DispatchConfig::default())
//!     .build();
//!
//! dispatcher.register([
//!     HandlerGroup::new().on("NewSession", |ctx: HandlerContext| async move {
//!         ctx.set_state("Playing");
//!         ctx.ask("Guess a number", "Guess a number between one and a hundred").await
//!     }),
//!     HandlerGroup::for_state("Playing").on("Unhandled", |ctx: HandlerContext| async move {
//!         ctx.ask("Say a number", "Say a number").await
//!     }),
//! ])?;
//!
//! let response = dispatcher.execute().await?;
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod registry;
pub mod responses;

#[cfg(test)]
mod testing;

pub use context::{EventArgs, HandlerContext};
pub use dispatcher::{DispatchConfig, DispatcherBuilder, Phase, SkillDispatcher, event_name};
pub use error::ListenerFault;
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerResult, IntoHandlerResult, into_handler};
pub use registry::{HandlerGroup, Registry};

pub use skillkit_core as core;
