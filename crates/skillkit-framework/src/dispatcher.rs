//! Request dispatcher for skillkit.
//!
//! A [`SkillDispatcher`] is created for exactly one incoming request. It owns
//! a [`Registry`](crate::Registry) that the integrator fills with handler
//! groups, then [`execute`](SkillDispatcher::execute) makes one dispatch
//! decision:
//!
//! 1. Read the dispatch state from the reserved `STATE` attribute
//! 2. Reject requests addressed to another application
//! 3. Build the composite event name (`NewSession`, the intent name or
//!    `SessionEndedRequest`, followed by the state)
//! 4. On a new session with an attribute table configured, fetch and merge
//!    persisted attributes
//! 5. Fire the listeners bound to the event name, or the `Unhandled` +
//!    state fallback, or nothing at all
//!
//! ```text
//! Idle ──▶ AwaitingAttributes ──▶ Dispatching ──▶ Done
//!   │                                  ▲
//!   └──────────────────────────────────┘
//! ```
//!
//! Handler errors and panics are caught here and reported as
//! [`DispatchError::HandlerFault`]; they never unwind into the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{Instrument, Level, debug, error, info, span, warn};

use skillkit_core::{
    BoxedAttributeStore, DispatchError, DispatchResult, RegistrationResult, Request,
    RequestEnvelope, merge_shallow, state_of,
};

use crate::context::DispatchScope;
use crate::error::ListenerFault;
use crate::handler::{Handler, HandlerResult, into_handler};
use crate::registry::HandlerGroup;
use crate::responses;

/// Base event fired for the first request of a session.
pub const NEW_SESSION: &str = "NewSession";
/// Base event fired when the platform ends the session.
pub const SESSION_ENDED: &str = "SessionEndedRequest";
/// Prefix of the fallback event.
pub const UNHANDLED: &str = "Unhandled";

/// Computes the composite event name for a request.
///
/// The base is `NewSession` for a new session regardless of request type,
/// otherwise the intent name, `SessionEndedRequest`, or the empty string.
pub fn event_name(is_new_session: bool, request: &Request, state: Option<&str>) -> String {
    let base = if is_new_session {
        NEW_SESSION
    } else {
        match request {
            Request::IntentRequest { intent, .. } => intent.name.as_str(),
            Request::SessionEndedRequest { .. } => SESSION_ENDED,
            _ => "",
        }
    };
    format!("{base}{}", state.unwrap_or(""))
}

/// Lifecycle phase of a dispatcher instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingAttributes,
    Dispatching,
    Done,
}

/// Per-skill dispatch settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Expected application id. Requests for any other id are rejected.
    pub app_id: Option<String>,

    /// Attribute table name. Enables fetching on new sessions and the
    /// built-in `:saveState` persistence.
    pub attributes_table: Option<String>,

    /// Persist attributes on every response, not only when the session ends.
    pub save_before_response: bool,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SkillDispatcher`].
pub struct DispatcherBuilder {
    envelope: RequestEnvelope,
    config: DispatchConfig,
    store: Option<BoxedAttributeStore>,
}

impl DispatcherBuilder {
    /// Sets the dispatch configuration.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Wires an attribute store.
    pub fn store(mut self, store: BoxedAttributeStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the dispatcher with the built-in response listeners registered.
    pub fn build(self) -> SkillDispatcher {
        let scope = DispatchScope::new(self.envelope, self.config, self.store);
        scope.registry.lock().commit(responses::builtin_group());
        SkillDispatcher {
            scope: Arc::new(scope),
        }
    }
}

// ============================================================================
// SkillDispatcher
// ============================================================================

/// Dispatches one request to its registered handlers.
///
/// # Thread Safety
///
/// `SkillDispatcher` is `Send + Sync`; registration takes `&self`.
pub struct SkillDispatcher {
    scope: Arc<DispatchScope>,
}

impl SkillDispatcher {
    /// Starts building a dispatcher for `envelope`.
    pub fn builder(envelope: RequestEnvelope) -> DispatcherBuilder {
        DispatcherBuilder {
            envelope,
            config: DispatchConfig::default(),
            store: None,
        }
    }

    /// Creates a dispatcher with the given configuration and no store.
    pub fn new(envelope: RequestEnvelope, config: DispatchConfig) -> Self {
        Self::builder(envelope).config(config).build()
    }

    /// Registers handler groups.
    ///
    /// Nothing from the call is committed if any group is malformed.
    pub fn register<I>(&self, groups: I) -> RegistrationResult<()>
    where
        I: IntoIterator<Item = HandlerGroup>,
    {
        self.scope.registry.lock().register(groups)
    }

    /// Adds a single persistent listener.
    pub fn on<H: Handler>(&self, name: impl Into<String>, handler: H) {
        self.scope.registry.lock().on(name, into_handler(handler));
    }

    /// Returns the number of listeners bound to `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.scope.registry.lock().listener_count(name)
    }

    /// Returns `true` if two or more listeners are bound to `name`.
    pub fn is_overridden(&self, name: &str) -> bool {
        self.scope.registry.lock().is_overridden(name)
    }

    /// Returns the dispatch configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.scope.config
    }

    /// Runs the dispatch and returns its completion.
    ///
    /// `Ok(None)` means no handler completed the dispatch, including the
    /// case where no handler was bound at all.
    pub async fn execute(self) -> DispatchResult {
        let scope = self.scope;
        let span = span!(
            Level::DEBUG,
            "dispatch",
            request_type = scope.envelope().request.request_type(),
            user_id = %scope.envelope().user_id(),
        );

        let outcome = AssertUnwindSafe(Self::run(Arc::clone(&scope)))
            .catch_unwind()
            .instrument(span)
            .await;

        let event = scope.event_name.get().map_or("", String::as_str);
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let fault = ListenerFault::from_error(event, err);
                error!(
                    event = %fault.event,
                    error = %fault.message,
                    trace = %fault.trace,
                    "Handler failed"
                );
                scope.complete(Err(fault.into()));
            }
            Err(panic) => {
                let fault = ListenerFault::from_panic(event, panic.as_ref());
                error!(
                    event = %fault.event,
                    error = %fault.message,
                    backtrace = %fault.trace,
                    "Handler panicked"
                );
                scope.complete(Err(fault.into()));
            }
        }

        scope.transition(Phase::Done);
        scope.take_completion()
    }

    async fn run(scope: Arc<DispatchScope>) -> HandlerResult {
        let envelope = scope.envelope();
        let config = &scope.config;

        let state = scope.with_attributes(|attrs| state_of(attrs));
        scope.begin_state(state.clone());

        let request_app_id = envelope.application_id();
        match config.app_id.as_deref() {
            None => warn!("Application ID is not set"),
            Some(expected) if expected != request_app_id => {
                info!(
                    expected,
                    got = request_app_id,
                    "The application ids don't match"
                );
                scope.complete(Err(DispatchError::InvalidApplicationId {
                    expected: expected.to_string(),
                    got: request_app_id.to_string(),
                }));
                return Ok(());
            }
            Some(_) => {}
        }

        let is_new = envelope.session.is_new;
        let event = event_name(is_new, &envelope.request, state.as_deref());
        debug!(event = %event, state = ?state, "Resolved event name");
        let _ = scope.event_name.set(event.clone());

        if let (Some(table), true) = (config.attributes_table.as_deref(), is_new) {
            scope.transition(Phase::AwaitingAttributes);
            let fetched = match &scope.store {
                Some(store) => store
                    .get(table, envelope.user_id())
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("no attribute store configured".to_string()),
            };
            match fetched {
                Ok(fetched) => {
                    debug!(table, keys = fetched.len(), "Merging persisted attributes");
                    scope.with_attributes(|attrs| merge_shallow(attrs, fetched));
                }
                Err(e) => {
                    error!(table, error = %e, "Failed to fetch user state");
                    scope.complete(Err(DispatchError::AttributeFetch(e)));
                    return Ok(());
                }
            }
        }

        scope.transition(Phase::Dispatching);
        let target = {
            let registry = scope.registry.lock();
            if registry.listener_count(&event) > 0 {
                Some(event)
            } else {
                let fallback = format!("{UNHANDLED}{}", state.as_deref().unwrap_or(""));
                (registry.listener_count(&fallback) > 0).then_some(fallback)
            }
        };

        match target {
            Some(name) => scope.fire(name, Arc::default()).await,
            None => {
                debug!("No handler or fallback bound, nothing to dispatch");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for SkillDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillDispatcher")
            .field("scope", &self.scope)
            .finish()
    }
}
