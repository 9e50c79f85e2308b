//! Inbound request model.
//!
//! Only the subset of the platform schema that the dispatcher reads is
//! modelled here. Unknown fields are ignored on deserialisation.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::attributes::Attributes;

/// The full inbound envelope: a session plus one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Schema version reported by the platform.
    #[serde(default)]
    pub version: Option<String>,
    /// The conversation session this request belongs to.
    pub session: Session,
    /// The request itself.
    pub request: Request,
}

impl RequestEnvelope {
    /// Parses an envelope from its JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Returns the application identifier the request was sent to.
    pub fn application_id(&self) -> &str {
        &self.session.application.application_id
    }

    /// Returns the user identifier used as the attribute store key.
    pub fn user_id(&self) -> &str {
        &self.session.user.user_id
    }
}

/// Conversation session data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// `true` on the first request of a session.
    #[serde(rename = "new", default)]
    pub is_new: bool,
    /// Platform session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Attributes carried from the previous response. Absent or `null` means
    /// empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attributes: Attributes,
    /// The application the request targets.
    #[serde(default)]
    pub application: Application,
    /// The user talking to the skill.
    #[serde(default)]
    pub user: User,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Attributes, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Attributes>::deserialize(deserializer)?.unwrap_or_default())
}

/// Application identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub application_id: String,
}

/// User identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub user_id: String,
    /// Token issued through account linking, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// The request union, discriminated by its `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// The user opened the skill without an intent.
    LaunchRequest {
        #[serde(rename = "requestId", default)]
        request_id: String,
    },
    /// The user spoke an intent.
    IntentRequest {
        #[serde(rename = "requestId", default)]
        request_id: String,
        intent: Intent,
    },
    /// The session ended on the platform side.
    SessionEndedRequest {
        #[serde(rename = "requestId", default)]
        request_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    /// Any request type the dispatcher has no base event for.
    #[serde(other)]
    Unknown,
}

impl Request {
    /// Returns the platform type string of this request.
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::LaunchRequest { .. } => "LaunchRequest",
            Self::IntentRequest { .. } => "IntentRequest",
            Self::SessionEndedRequest { .. } => "SessionEndedRequest",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns the intent if this is an intent request.
    pub fn intent(&self) -> Option<&Intent> {
        match self {
            Self::IntentRequest { intent, .. } => Some(intent),
            _ => None,
        }
    }
}

/// A recognised intent and its slot values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub slots: HashMap<String, Slot>,
}

impl Intent {
    /// Returns the value of a slot, if the slot was filled.
    pub fn slot_value(&self, name: &str) -> Option<&str> {
        self.slots.get(name).and_then(|s| s.value.as_deref())
    }
}

/// A single slot of an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}
