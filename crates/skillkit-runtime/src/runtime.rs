//! Per-request orchestration.
//!
//! A [`SkillRuntime`] holds everything that outlives a single request: the
//! dispatch settings, the attribute store and the registered handler groups.
//! Each call to [`SkillRuntime::handle`] builds a fresh dispatcher, registers
//! the groups on it and runs it to completion.
//!
//! ```rust,ignore
//! use skillkit_runtime::{ConfigLoader, SkillRuntime};
//!
//! let config = ConfigLoader::new().load()?;
//! let mut runtime = SkillRuntime::from_config(&config).await?;
//! runtime.register(handlers())?;
//!
//! // Direct use
//! let response = runtime.handle_json(&body).await?;
//!
//! // Or as a tower service
//! let response = runtime.clone().oneshot(envelope).await?;
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;
use tracing::{Instrument, Level, debug, info, span, warn};

use skillkit_core::{
    BoxedAttributeStore, DispatchError, DispatchResult, MemoryStore, RequestEnvelope,
    ResponseEnvelope,
};
use skillkit_framework::{DispatchConfig, HandlerGroup, Registry, SkillDispatcher};

use crate::config::{SkillConfig, StorageBackend};
use crate::error::RuntimeResult;
use crate::store::JsonFileStore;

/// Long-lived skill state shared by every request.
///
/// Cloning is cheap; clones share the store and the handler groups.
#[derive(Clone, Default)]
pub struct SkillRuntime {
    config: DispatchConfig,
    store: Option<BoxedAttributeStore>,
    groups: Arc<Vec<HandlerGroup>>,
}

impl SkillRuntime {
    /// Creates a runtime with no store and no handlers.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Creates a runtime, opening the store selected by `config.storage`.
    pub async fn from_config(config: &SkillConfig) -> RuntimeResult<Self> {
        let store: Option<BoxedAttributeStore> = match config.storage.backend {
            StorageBackend::None => None,
            StorageBackend::Memory => Some(Arc::new(MemoryStore::new())),
            StorageBackend::File => {
                let base_dir = config.storage.resolve_base_dir();
                Some(Arc::new(JsonFileStore::open(base_dir).await?))
            }
        };

        info!(
            backend = ?config.storage.backend,
            app_id = ?config.dispatch.app_id,
            attributes_table = ?config.dispatch.attributes_table,
            "Skill runtime initialized"
        );

        Ok(Self {
            config: config.dispatch.clone(),
            store,
            groups: Arc::default(),
        })
    }

    /// Replaces the attribute store.
    pub fn with_store(mut self, store: BoxedAttributeStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Adds handler groups used for every subsequent request.
    ///
    /// The groups are validated up front; nothing is added if any of them is
    /// malformed.
    pub fn register<I>(&mut self, groups: I) -> RuntimeResult<()>
    where
        I: IntoIterator<Item = HandlerGroup>,
    {
        let groups: Vec<HandlerGroup> = groups.into_iter().collect();
        Registry::new().register(groups.iter().cloned())?;

        debug!(count = groups.len(), "Registered handler groups");
        Arc::make_mut(&mut self.groups).extend(groups);
        Ok(())
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&BoxedAttributeStore> {
        self.store.as_ref()
    }

    /// Returns the number of registered handler groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Dispatches one request.
    pub async fn handle(&self, envelope: RequestEnvelope) -> DispatchResult {
        let span = span!(
            Level::INFO,
            "skill_request",
            request_type = envelope.request.request_type(),
            session_id = envelope.session.session_id.as_deref().unwrap_or(""),
        );

        async move {
            let mut builder = SkillDispatcher::builder(envelope).config(self.config.clone());
            if let Some(store) = &self.store {
                builder = builder.store(Arc::clone(store));
            }
            let dispatcher = builder.build();
            dispatcher
                .register(self.groups.iter().cloned())
                .map_err(|err| DispatchError::failed(err.to_string()))?;

            let outcome = dispatcher.execute().await;
            match &outcome {
                Ok(Some(response)) => debug!(
                    should_end_session = response.response.should_end_session,
                    "Request completed"
                ),
                Ok(None) => debug!("Request completed without a response"),
                Err(err) => warn!(error = %err, "Request failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Parses a request body and dispatches it.
    pub async fn handle_json(&self, body: &str) -> RuntimeResult<Option<ResponseEnvelope>> {
        let envelope = RequestEnvelope::from_json(body)?;
        Ok(self.handle(envelope).await?)
    }
}

impl std::fmt::Debug for SkillRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRuntime")
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl Service<RequestEnvelope> for SkillRuntime {
    type Response = Option<ResponseEnvelope>;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, envelope: RequestEnvelope) -> Self::Future {
        let runtime = self.clone();
        Box::pin(async move { runtime.handle(envelope).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use skillkit_core::{OutputSpeech, RegistrationError, STATE_KEY};
    use skillkit_framework::HandlerContext;
    use tower::ServiceExt;

    use crate::config::StorageConfig;
    use crate::error::RuntimeError;

    const APP_ID: &str = "amzn1.ask.skill.runtime";

    fn body(is_new: bool, request: Value, attributes: Value) -> String {
        json!({
            "version": "1.0",
            "session": {
                "new": is_new,
                "sessionId": "session-1",
                "application": { "applicationId": APP_ID },
                "attributes": attributes,
                "user": { "userId": "user-1" }
            },
            "request": request
        })
        .to_string()
    }

    fn launch() -> Value {
        json!({ "type": "LaunchRequest", "requestId": "r-1" })
    }

    fn intent(name: &str) -> Value {
        json!({ "type": "IntentRequest", "requestId": "r-2", "intent": { "name": name } })
    }

    fn counter_groups() -> Vec<HandlerGroup> {
        vec![
            HandlerGroup::new().on("NewSession", |ctx: HandlerContext| async move {
                ctx.set_state("Counting");
                ctx.set_attribute("count", 0);
                ctx.ask("Say count", "Say count").await
            }),
            HandlerGroup::for_state("Counting").on("CountIntent", |ctx: HandlerContext| async move {
                let count = ctx.attribute("count").and_then(|v| v.as_i64()).unwrap_or(0);
                ctx.set_attribute("count", count + 1);
                ctx.ask("Again?", "Again?").await
            }),
        ]
    }

    #[tokio::test]
    async fn test_handle_json_across_turns() {
        let mut runtime = SkillRuntime::new(DispatchConfig::default());
        runtime.register(counter_groups()).unwrap();

        let first = runtime
            .handle_json(&body(true, launch(), json!({})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.session_attributes.get(STATE_KEY), Some(&json!("Counting")));

        let attributes = Value::Object(first.session_attributes);
        let second = runtime
            .handle_json(&body(false, intent("CountIntent"), attributes))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.session_attributes.get("count"), Some(&json!(1)));
        assert_eq!(
            second.response.output_speech,
            Some(OutputSpeech::ssml("Again?"))
        );
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let runtime = SkillRuntime::new(DispatchConfig::default());
        let err = runtime.handle_json("{ not json").await.unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rejected_group_is_not_added() {
        let mut runtime = SkillRuntime::new(DispatchConfig::default());
        runtime.register(counter_groups()).unwrap();

        let err = runtime
            .register([HandlerGroup::new().on("", |_ctx: HandlerContext| async {})])
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Registration(RegistrationError::EmptyEventName { group: 0 })
        ));
        assert_eq!(runtime.group_count(), 2);
    }

    #[tokio::test]
    async fn test_app_id_mismatch() {
        let mut runtime = SkillRuntime::new(DispatchConfig {
            app_id: Some("amzn1.ask.skill.other".into()),
            ..Default::default()
        });
        runtime.register(counter_groups()).unwrap();

        let err = runtime
            .handle_json(&body(true, launch(), json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Dispatch(DispatchError::InvalidApplicationId { .. })
        ));
    }

    #[test]
    fn test_service_is_always_ready() {
        let mut runtime = SkillRuntime::new(DispatchConfig::default());
        let mut task = tokio_test::task::spawn(());
        tokio_test::assert_ready_ok!(task.enter(|cx, _| runtime.poll_ready(cx)));
    }

    #[tokio::test]
    async fn test_tower_service() {
        let mut runtime = SkillRuntime::new(DispatchConfig::default());
        runtime.register(counter_groups()).unwrap();

        let envelope = RequestEnvelope::from_json(&body(true, launch(), json!({}))).unwrap();
        let response = runtime.oneshot(envelope).await.unwrap().unwrap();
        assert!(!response.response.should_end_session);
    }

    #[tokio::test]
    async fn test_file_store_persists_between_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let config = SkillConfig {
            dispatch: DispatchConfig {
                attributes_table: Some("sessions".into()),
                ..Default::default()
            },
            storage: StorageConfig {
                backend: StorageBackend::File,
                base_dir: Some(dir.path().to_path_buf()),
            },
            ..Default::default()
        };

        let mut runtime = SkillRuntime::from_config(&config).await.unwrap();
        runtime
            .register([HandlerGroup::new()
                .on("NewSession", |ctx: HandlerContext| async move {
                    let visits = ctx.attribute("visits").and_then(|v| v.as_i64()).unwrap_or(0);
                    ctx.set_attribute("visits", visits + 1);
                    ctx.tell("Welcome").await
                })])
            .unwrap();

        runtime
            .handle_json(&body(true, launch(), json!({})))
            .await
            .unwrap();
        let second = runtime
            .handle_json(&body(true, launch(), json!({})))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.session_attributes.get("visits"), Some(&json!(2)));
        assert!(dir.path().join("sessions.json").exists());
    }

    #[tokio::test]
    async fn test_no_listener_yields_none() {
        let runtime = SkillRuntime::new(DispatchConfig::default());
        let response = runtime
            .handle_json(&body(false, intent("Nothing"), json!({})))
            .await
            .unwrap();
        assert!(response.is_none());
    }
}
