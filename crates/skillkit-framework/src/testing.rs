//! Shared fixtures for the unit tests of this crate.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use skillkit_core::{AttributeStore, Attributes, RequestEnvelope, StoreError, StoreResult};

use crate::context::HandlerContext;
use crate::handler::{BoxFuture, HandlerResult};

pub const APP_ID: &str = "amzn1.ask.skill.test";
pub const USER_ID: &str = "amzn1.ask.account.user";

pub fn envelope(is_new: bool, request: Value, attributes: Value) -> RequestEnvelope {
    serde_json::from_value(json!({
        "version": "1.0",
        "session": {
            "new": is_new,
            "sessionId": "session-1",
            "application": { "applicationId": APP_ID },
            "attributes": attributes,
            "user": { "userId": USER_ID }
        },
        "request": request
    }))
    .unwrap()
}

pub fn intent(name: &str) -> Value {
    json!({ "type": "IntentRequest", "requestId": "r-1", "intent": { "name": name } })
}

pub fn launch() -> Value {
    json!({ "type": "LaunchRequest", "requestId": "r-1" })
}

pub fn session_ended() -> Value {
    json!({ "type": "SessionEndedRequest", "requestId": "r-1", "reason": "USER_INITIATED" })
}

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Records which listeners ran, in order.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// A handler that records `label` and nothing else.
    pub fn recorder(
        &self,
        label: &'static str,
    ) -> impl Fn(HandlerContext) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static
    {
        let trace = self.clone();
        move |_ctx: HandlerContext| -> BoxFuture<'static, HandlerResult> {
            let trace = trace.clone();
            Box::pin(async move {
                trace.push(label);
                Ok(())
            })
        }
    }
}

/// A store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl AttributeStore for BrokenStore {
    async fn get(&self, _table: &str, _user_id: &str) -> StoreResult<Attributes> {
        Err(StoreError::backend("table does not exist"))
    }

    async fn put(&self, _table: &str, _user_id: &str, _attributes: &Attributes) -> StoreResult<()> {
        Err(StoreError::backend("throughput exceeded"))
    }
}
