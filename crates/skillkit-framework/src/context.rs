//! Execution context for skillkit handlers.
//!
//! This module provides two types that together model one dispatch:
//!
//! - [`DispatchScope`]: the **shared** base for one dispatcher instance. It
//!   owns the request, the live attribute mapping, the registry, the
//!   pending state, the response buffer and the completion slot.
//!
//! - [`HandlerContext`]: the value handed to each listener. It combines an
//!   `Arc<DispatchScope>` with the listener's own resolved event name and
//!   the arguments it was emitted with.
//!
//! Attribute writes made by one handler are visible to every handler that
//! runs after it in the same dispatch.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use skillkit_core::{
    Attributes, BoxedAttributeStore, DispatchError, DispatchResult, Request, RequestEnvelope,
    ResponseEnvelope, STATE_KEY, Session, User, state_of,
};

use crate::dispatcher::{DispatchConfig, Phase};
use crate::error::ListenerFault;
use crate::handler::{BoxFuture, BoxedHandler, Handler, HandlerResult, into_handler};
use crate::registry::Registry;
use crate::responses;

/// Arguments passed along with an emitted event.
pub type EventArgs = Arc<Vec<Value>>;

/// What handlers asked for the next request's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum StateChange {
    #[default]
    Unchanged,
    Set(String),
    Cleared,
}

// =============================================================================
// DispatchScope: one per dispatcher instance
// =============================================================================

/// The shared state of a single dispatcher instance.
pub struct DispatchScope {
    /// Request data. `session.attributes` is moved into `attributes`.
    envelope: RequestEnvelope,
    attributes: Mutex<Attributes>,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) config: DispatchConfig,
    pub(crate) store: Option<BoxedAttributeStore>,
    /// State read from the attributes when dispatch started.
    dispatch_state: OnceLock<Option<String>>,
    /// State change requested for the next request.
    state_change: Mutex<StateChange>,
    pub(crate) event_name: OnceLock<String>,
    phase: Mutex<Phase>,
    response: Mutex<Option<ResponseEnvelope>>,
    completion: Mutex<Option<Result<ResponseEnvelope, DispatchError>>>,
}

impl DispatchScope {
    pub(crate) fn new(
        mut envelope: RequestEnvelope,
        config: DispatchConfig,
        store: Option<BoxedAttributeStore>,
    ) -> Self {
        let attributes = std::mem::take(&mut envelope.session.attributes);
        Self {
            envelope,
            attributes: Mutex::new(attributes),
            registry: Mutex::new(Registry::new()),
            config,
            store,
            dispatch_state: OnceLock::new(),
            state_change: Mutex::new(StateChange::Unchanged),
            event_name: OnceLock::new(),
            phase: Mutex::new(Phase::Idle),
            response: Mutex::new(None),
            completion: Mutex::new(None),
        }
    }

    pub(crate) fn envelope(&self) -> &RequestEnvelope {
        &self.envelope
    }

    pub(crate) fn with_attributes<R>(&self, f: impl FnOnce(&mut Attributes) -> R) -> R {
        f(&mut self.attributes.lock())
    }

    /// Records the dispatch state. Only the first call has any effect.
    pub(crate) fn begin_state(&self, state: Option<String>) {
        let _ = self.dispatch_state.set(state);
    }

    pub(crate) fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub(crate) fn transition(&self, phase: Phase) {
        let mut current = self.phase.lock();
        debug!(from = ?*current, to = ?phase, "Dispatch phase transition");
        *current = phase;
    }

    /// Stores the dispatch outcome. The first completion wins.
    pub(crate) fn complete(&self, outcome: Result<ResponseEnvelope, DispatchError>) -> bool {
        let mut slot = self.completion.lock();
        if slot.is_some() {
            match &outcome {
                Ok(_) => warn!("Dispatch already completed, ignoring response"),
                Err(e) => warn!(error = %e, "Dispatch already completed, ignoring failure"),
            }
            return false;
        }
        *slot = Some(outcome);
        true
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.completion.lock().is_some()
    }

    pub(crate) fn take_completion(&self) -> DispatchResult {
        self.completion.lock().take().transpose()
    }

    /// Fires every listener bound to `name`, in registration order.
    ///
    /// The listener list is snapshotted before the first listener runs.
    /// The first failing listener stops the emit and its error is returned
    /// tagged with `name`.
    pub(crate) fn fire(
        self: &Arc<Self>,
        name: String,
        args: EventArgs,
    ) -> BoxFuture<'static, HandlerResult> {
        let scope = Arc::clone(self);
        Box::pin(async move {
            let handlers = scope.registry.lock().take_for_emit(&name);
            if handlers.is_empty() {
                trace!(event = %name, "No listeners bound");
                return Ok(());
            }

            for handler in handlers {
                trace!(event = %name, "Invoking listener");
                let ctx = HandlerContext::new(Arc::clone(&scope), name.clone(), args.clone());
                handler
                    .call(ctx)
                    .await
                    .map_err(|err| ListenerFault::tag(&name, err))?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for DispatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchScope")
            .field("request", &self.envelope.request)
            .field("event_name", &self.event_name.get())
            .field("phase", &self.phase())
            .field("registry", &*self.registry.lock())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// HandlerContext: one per listener invocation
// =============================================================================

/// The context object passed to a listener.
///
/// Cloning is cheap; every clone refers to the same dispatch.
///
/// ```rust,ignore
/// async fn guess(ctx: HandlerContext) -> anyhow::Result<()> {
///     let target = ctx.attribute("target").and_then(|v| v.as_i64()).unwrap_or(0);
///     ctx.set_attribute("guesses", 1);
///     if ctx.is_overridden() {
///         return Ok(());
///     }
///     ctx.ask("Higher", "Guess again").await
/// }
/// ```
#[derive(Clone)]
pub struct HandlerContext {
    scope: Arc<DispatchScope>,
    name: Arc<str>,
    args: EventArgs,
}

impl HandlerContext {
    pub(crate) fn new(scope: Arc<DispatchScope>, name: String, args: EventArgs) -> Self {
        Self {
            scope,
            name: name.into(),
            args,
        }
    }

    // ─── Binding ──────────────────────────────────────────────────────────────

    /// Returns the resolved event name this listener is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arguments the event was emitted with.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns one argument.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Returns one argument if it is a string.
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.arg(index).and_then(Value::as_str)
    }

    /// Returns `true` if this listener's event name has two or more
    /// listeners bound.
    pub fn is_overridden(&self) -> bool {
        self.scope.registry.lock().is_overridden(&self.name)
    }

    // ─── Request ──────────────────────────────────────────────────────────────

    /// Returns the request being dispatched.
    pub fn request(&self) -> &Request {
        &self.scope.envelope().request
    }

    /// Returns the whole inbound envelope.
    ///
    /// The envelope's `session.attributes` is empty; use
    /// [`attributes`](Self::attributes) for the live mapping.
    pub fn envelope(&self) -> &RequestEnvelope {
        self.scope.envelope()
    }

    /// Returns the session the request belongs to.
    ///
    /// As with [`envelope`](Self::envelope), `attributes` is empty here.
    pub fn session(&self) -> &Session {
        &self.scope.envelope().session
    }

    /// Returns `true` on the first request of a session.
    pub fn is_new_session(&self) -> bool {
        self.scope.envelope().session.is_new
    }

    /// Returns the requesting user.
    pub fn user(&self) -> &User {
        &self.scope.envelope().session.user
    }

    /// Returns the dispatch configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.scope.config
    }

    /// Returns the attribute store, if one is wired.
    pub fn store(&self) -> Option<&BoxedAttributeStore> {
        self.scope.store.as_ref()
    }

    /// Returns the current dispatch phase.
    pub fn phase(&self) -> Phase {
        self.scope.phase()
    }

    // ─── Attributes ───────────────────────────────────────────────────────────

    /// Returns a snapshot of the live attribute mapping.
    pub fn attributes(&self) -> Attributes {
        self.scope.with_attributes(|attrs| attrs.clone())
    }

    /// Returns one attribute.
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.scope.with_attributes(|attrs| attrs.get(key).cloned())
    }

    /// Sets one attribute.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<Value>) {
        let (key, value) = (key.into(), value.into());
        self.scope.with_attributes(|attrs| attrs.insert(key, value));
    }

    /// Removes one attribute, returning its previous value.
    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.scope.with_attributes(|attrs| attrs.remove(key))
    }

    /// Runs `f` with mutable access to the live attribute mapping.
    ///
    /// The mapping is locked for the duration of `f`; do not emit from
    /// inside it.
    pub fn with_attributes<R>(&self, f: impl FnOnce(&mut Attributes) -> R) -> R {
        self.scope.with_attributes(f)
    }

    // ─── State ────────────────────────────────────────────────────────────────

    /// Returns the state the current event name was resolved with.
    pub fn state(&self) -> Option<&str> {
        self.scope.dispatch_state.get().and_then(Option::as_deref)
    }

    /// Returns the state that will be handed back for the next request.
    ///
    /// Without a `set_state` or `clear_state` call this is whatever the live
    /// attributes hold, including a state restored from the store.
    pub fn pending_state(&self) -> Option<String> {
        match &*self.scope.state_change.lock() {
            StateChange::Set(state) => return Some(state.clone()),
            StateChange::Cleared => return None,
            StateChange::Unchanged => {}
        }
        self.scope.with_attributes(|attrs| state_of(attrs))
    }

    /// Sets the state for the next request.
    ///
    /// The event name of the current dispatch is not affected.
    pub fn set_state(&self, state: impl Into<String>) {
        *self.scope.state_change.lock() = StateChange::Set(state.into());
    }

    /// Clears the state for the next request.
    pub fn clear_state(&self) {
        *self.scope.state_change.lock() = StateChange::Cleared;
    }

    /// Writes a requested state change into `attributes` under
    /// [`STATE_KEY`]. An untouched state leaves `attributes` as it is.
    ///
    /// Does not lock the live attributes, so it is safe to call from
    /// [`with_attributes`](Self::with_attributes).
    pub fn apply_pending_state(&self, attributes: &mut Attributes) {
        match &*self.scope.state_change.lock() {
            StateChange::Set(state) => {
                attributes.insert(STATE_KEY.to_string(), Value::String(state.clone()));
            }
            StateChange::Cleared => {
                attributes.remove(STATE_KEY);
            }
            StateChange::Unchanged => {}
        }
    }

    // ─── Sub-dispatch ─────────────────────────────────────────────────────────

    /// Fires every listener bound to `name`.
    pub fn emit(&self, name: impl Into<String>) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(name, Vec::new())
    }

    /// Fires every listener bound to `name` with arguments.
    pub fn emit_with(
        &self,
        name: impl Into<String>,
        args: Vec<Value>,
    ) -> BoxFuture<'static, HandlerResult> {
        self.scope.fire(name.into(), Arc::new(args))
    }

    /// Adds a persistent listener to this dispatch.
    pub fn on<H: Handler>(&self, name: impl Into<String>, handler: H) {
        self.scope.registry.lock().on(name, into_handler(handler));
    }

    /// Adds a listener that fires at most once.
    pub fn once<H: Handler>(&self, name: impl Into<String>, handler: H) {
        self.scope.registry.lock().once(name, into_handler(handler));
    }

    /// Adds an already boxed listener.
    pub fn on_boxed(&self, name: impl Into<String>, handler: BoxedHandler) {
        self.scope.registry.lock().on(name, handler);
    }

    // ─── Response & completion ────────────────────────────────────────────────

    /// Returns the buffered response.
    pub fn response(&self) -> Option<ResponseEnvelope> {
        self.scope.response.lock().clone()
    }

    /// Replaces the buffered response.
    pub fn set_response(&self, response: ResponseEnvelope) {
        *self.scope.response.lock() = Some(response);
    }

    /// Completes the dispatch with `response`.
    ///
    /// Returns `false` if the dispatch was already completed.
    pub fn succeed(&self, response: ResponseEnvelope) -> bool {
        self.scope.complete(Ok(response))
    }

    /// Completes the dispatch with a failure.
    ///
    /// Returns `false` if the dispatch was already completed.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.scope.complete(Err(DispatchError::failed(message)))
    }

    /// Returns `true` once the dispatch has a response or a failure.
    pub fn is_complete(&self) -> bool {
        self.scope.is_complete()
    }

    // ─── Response shortcuts ───────────────────────────────────────────────────

    /// Speaks `speech` and ends the session.
    pub fn tell(&self, speech: &str) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(responses::TELL, vec![speech.into()])
    }

    /// Speaks `speech` and keeps the session open with a reprompt.
    pub fn ask(&self, speech: &str, reprompt: &str) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(responses::ASK, vec![speech.into(), reprompt.into()])
    }

    /// Like [`tell`](Self::tell), with a card.
    pub fn tell_with_card(
        &self,
        speech: &str,
        title: &str,
        content: &str,
        image: Option<Value>,
    ) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(
            responses::TELL_WITH_CARD,
            vec![
                speech.into(),
                title.into(),
                content.into(),
                image.unwrap_or(Value::Null),
            ],
        )
    }

    /// Like [`ask`](Self::ask), with a card.
    pub fn ask_with_card(
        &self,
        speech: &str,
        reprompt: &str,
        title: &str,
        content: &str,
        image: Option<Value>,
    ) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(
            responses::ASK_WITH_CARD,
            vec![
                speech.into(),
                reprompt.into(),
                title.into(),
                content.into(),
                image.unwrap_or(Value::Null),
            ],
        )
    }

    /// Speaks `speech`, ends the session and shows an account-linking card.
    pub fn tell_with_link_account_card(&self, speech: &str) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(responses::TELL_WITH_LINK_ACCOUNT_CARD, vec![speech.into()])
    }

    /// Asks with an account-linking card.
    pub fn ask_with_link_account_card(
        &self,
        speech: &str,
        reprompt: &str,
    ) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(
            responses::ASK_WITH_LINK_ACCOUNT_CARD,
            vec![speech.into(), reprompt.into()],
        )
    }

    /// Persists the attributes and completes the dispatch.
    ///
    /// With `force`, the attributes are written even if the session stays
    /// open, and the pending state is copied into them first.
    pub fn save_state(&self, force: bool) -> BoxFuture<'static, HandlerResult> {
        self.emit_with(responses::SAVE_STATE, vec![force.into()])
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
