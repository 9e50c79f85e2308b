//! Handler registry.
//!
//! The registry maps composite event names to an ordered list of listeners.
//! Registration is additive: binding a second listener to a name keeps the
//! first one, and both fire in registration order. A name with two or more
//! listeners is *overridden*.
//!
//! Handlers are registered in [`HandlerGroup`]s. A group may carry a state
//! tag, in which case every base name in the group is suffixed with the tag
//! before insertion:
//!
//! ```rust,ignore
//! let playing = HandlerGroup::for_state("Playing")
//!     .on("AMAZON.StopIntent", stop)      // bound as "AMAZON.StopIntentPlaying"
//!     .on("Unhandled", reprompt);         // bound as "UnhandledPlaying"
//! ```

use std::collections::HashMap;
use std::collections::HashSet;

use tracing::trace;

use skillkit_core::{RegistrationError, RegistrationResult};

use crate::handler::{BoxedHandler, Handler, into_handler};

// ============================================================================
// HandlerGroup
// ============================================================================

/// A set of base-name to handler bindings, optionally scoped to a state.
#[derive(Clone, Default)]
pub struct HandlerGroup {
    state: Option<String>,
    entries: Vec<(String, BoxedHandler)>,
}

impl HandlerGroup {
    /// Creates a group whose names are registered as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a group whose names are suffixed with `state`.
    pub fn for_state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            entries: Vec::new(),
        }
    }

    /// Binds `handler` to the base event `name`.
    pub fn on<H: Handler>(self, name: impl Into<String>, handler: H) -> Self {
        self.on_boxed(name, into_handler(handler))
    }

    /// Binds an already boxed handler.
    pub fn on_boxed(mut self, name: impl Into<String>, handler: BoxedHandler) -> Self {
        self.entries.push((name.into(), handler));
        self
    }

    /// Returns the state tag of this group.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the group binds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the composite names this group registers, in order.
    pub fn event_names(&self) -> impl Iterator<Item = String> + '_ {
        let suffix = self.state.as_deref().unwrap_or("");
        self.entries
            .iter()
            .map(move |(name, _)| format!("{name}{suffix}"))
    }

    fn validate(&self, index: usize) -> RegistrationResult<()> {
        let mut seen = HashSet::new();
        for (name, _) in &self.entries {
            if name.is_empty() {
                return Err(RegistrationError::EmptyEventName { group: index });
            }
            if !seen.insert(name.as_str()) {
                return Err(RegistrationError::DuplicateKey {
                    group: index,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HandlerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("state", &self.state)
            .field("names", &self.entries.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Clone)]
struct Listener {
    handler: BoxedHandler,
    once: bool,
}

/// Mapping from composite event name to its listeners.
#[derive(Clone, Default)]
pub struct Registry {
    listeners: HashMap<String, Vec<Listener>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every binding of every group.
    ///
    /// All groups are validated first; if any is malformed nothing from this
    /// call is committed.
    pub fn register<I>(&mut self, groups: I) -> RegistrationResult<()>
    where
        I: IntoIterator<Item = HandlerGroup>,
    {
        let groups: Vec<HandlerGroup> = groups.into_iter().collect();
        for (index, group) in groups.iter().enumerate() {
            group.validate(index)?;
        }

        for group in groups {
            self.commit(group);
        }
        Ok(())
    }

    /// Inserts a group that is known to be well formed.
    pub(crate) fn commit(&mut self, group: HandlerGroup) {
        let suffix = group.state.unwrap_or_default();
        for (name, handler) in group.entries {
            self.insert(format!("{name}{suffix}"), handler, false);
        }
    }

    /// Adds a persistent listener for `name`.
    pub fn on(&mut self, name: impl Into<String>, handler: BoxedHandler) {
        self.insert(name.into(), handler, false);
    }

    /// Adds a listener for `name` that is removed the first time it fires.
    pub fn once(&mut self, name: impl Into<String>, handler: BoxedHandler) {
        self.insert(name.into(), handler, true);
    }

    fn insert(&mut self, name: String, handler: BoxedHandler, once: bool) {
        trace!(event = %name, once, "Registering listener");
        self.listeners
            .entry(name)
            .or_default()
            .push(Listener { handler, once });
    }

    /// Returns the number of listeners bound to `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map_or(0, Vec::len)
    }

    /// Returns `true` if at least two listeners are bound to `name`.
    pub fn is_overridden(&self, name: &str) -> bool {
        self.listener_count(name) > 1
    }

    /// Returns every bound event name.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.listeners.keys().map(String::as_str)
    }

    /// Returns the handlers to fire for `name`, in registration order.
    ///
    /// `once` listeners are removed from the registry before they are
    /// returned, so listeners added while firing only see later emits.
    pub(crate) fn take_for_emit(&mut self, name: &str) -> Vec<BoxedHandler> {
        let Some(listeners) = self.listeners.get_mut(name) else {
            return Vec::new();
        };

        let handlers = listeners.iter().map(|l| l.handler.clone()).collect();
        listeners.retain(|l| !l.once);
        if listeners.is_empty() {
            self.listeners.remove(name);
        }
        handlers
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("event_count", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HandlerContext;

    async fn noop(_ctx: HandlerContext) {}

    #[test]
    fn test_state_tag_suffixes_names() {
        let mut registry = Registry::new();
        registry
            .register([
                HandlerGroup::new().on("NewSession", noop),
                HandlerGroup::for_state("Playing")
                    .on("Stop", noop)
                    .on("Unhandled", noop),
            ])
            .unwrap();

        assert_eq!(registry.listener_count("NewSession"), 1);
        assert_eq!(registry.listener_count("StopPlaying"), 1);
        assert_eq!(registry.listener_count("UnhandledPlaying"), 1);
        assert_eq!(registry.listener_count("Stop"), 0);
    }

    #[test]
    fn test_second_binding_overrides_without_replacing() {
        let mut registry = Registry::new();
        registry
            .register([HandlerGroup::new().on("Stop", noop)])
            .unwrap();
        assert!(!registry.is_overridden("Stop"));

        registry
            .register([HandlerGroup::new().on("Stop", noop)])
            .unwrap();
        assert_eq!(registry.listener_count("Stop"), 2);
        assert!(registry.is_overridden("Stop"));
    }

    #[test]
    fn test_malformed_group_commits_nothing() {
        let mut registry = Registry::new();
        let err = registry
            .register([
                HandlerGroup::new().on("Launch", noop),
                HandlerGroup::new().on("", noop),
            ])
            .unwrap_err();

        assert_eq!(err, RegistrationError::EmptyEventName { group: 1 });
        assert_eq!(registry.listener_count("Launch"), 0);
        assert_eq!(registry.event_names().count(), 0);
    }

    #[test]
    fn test_duplicate_key_in_group() {
        let mut registry = Registry::new();
        let err = registry
            .register([HandlerGroup::for_state("Playing")
                .on("Stop", noop)
                .on("Stop", noop)])
            .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::DuplicateKey {
                group: 0,
                name: "Stop".into()
            }
        );
    }

    #[test]
    fn test_once_listener_is_removed_on_emit() {
        let mut registry = Registry::new();
        registry.on("Tick", into_handler(noop));
        registry.once("Tick", into_handler(noop));

        assert_eq!(registry.take_for_emit("Tick").len(), 2);
        assert_eq!(registry.listener_count("Tick"), 1);
        assert_eq!(registry.take_for_emit("Tick").len(), 1);
        assert!(registry.take_for_emit("Missing").is_empty());
    }

    #[test]
    fn test_group_event_names() {
        let group = HandlerGroup::for_state("Quiz").on("Answer", noop).on("Help", noop);
        let names: Vec<String> = group.event_names().collect();
        assert_eq!(names, ["AnswerQuiz", "HelpQuiz"]);
        assert_eq!(group.state(), Some("Quiz"));
        assert_eq!(group.len(), 2);
    }
}
