//! Handler system for skillkit.
//!
//! A handler is any async function that takes a [`HandlerContext`] and
//! returns either `()` or a `Result<(), E>`:
//!
//! ```rust,ignore
//! async fn launch(ctx: HandlerContext) -> anyhow::Result<()> {
//!     ctx.tell("Welcome").await
//! }
//!
//! async fn log_only(ctx: HandlerContext) {
//!     tracing::info!(event = ctx.name(), "seen");
//! }
//! ```
//!
//! Handlers are stored type-erased as [`BoxedHandler`] so one registry key
//! can hold listeners of different concrete types.

use std::future::Future;
use std::sync::Arc;

use crate::context::HandlerContext;

pub use futures::future::BoxFuture;

/// The result every listener resolves to.
pub type HandlerResult = anyhow::Result<()>;

// ============================================================================
// IntoHandlerResult - Normalise handler return values
// ============================================================================

/// Return types a handler may produce.
pub trait IntoHandlerResult: Send {
    /// Converts the return value into a [`HandlerResult`].
    fn into_handler_result(self) -> HandlerResult;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> HandlerResult {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<anyhow::Error> + Send,
{
    fn into_handler_result(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// An event listener.
///
/// Implemented for every `Fn(HandlerContext) -> impl Future` whose output
/// implements [`IntoHandlerResult`].
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler with its bound context.
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut, Res> Handler for F
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Res> + Send + 'static,
    Res: IntoHandlerResult + 'static,
{
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, HandlerResult> {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_handler_result() })
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn Handler>;

/// Converts a handler function into a [`BoxedHandler`].
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}
