//! # Skillkit Core
//!
//! The foundation layer of the skillkit dispatcher.
//!
//! This crate holds everything the dispatch engine consumes or produces but
//! does not itself decide:
//!
//! - **Request model**: the inbound envelope, its session and the typed
//!   request union ([`RequestEnvelope`], [`Session`], [`Request`])
//! - **Attributes**: the session attribute mapping and the reserved
//!   [`STATE_KEY`] ([`Attributes`])
//! - **Response model**: the outbound envelope and its builder
//!   ([`ResponseEnvelope`], [`ResponseBuilder`])
//! - **Attribute store contract**: the async `get`/`put` gateway and an
//!   in-memory implementation ([`AttributeStore`], [`MemoryStore`])
//! - **Errors**: dispatch, registration and store failures
//!
//! ```text
//! ┌──────────────┐     ┌────────────┐     ┌───────────┐
//! │   Request    │────▶│ Dispatcher │────▶│  Handler  │
//! │  (envelope)  │     │ (framework)│────▶│  Handler  │
//! └──────────────┘     └─────┬──────┘     └───────────┘
//!                            │
//!                     ┌──────▼──────┐
//!                     │ Attribute   │
//!                     │ Store       │
//!                     └─────────────┘
//! ```

pub mod attributes;
pub mod error;
pub mod request;
pub mod response;
pub mod store;

pub use attributes::{Attributes, STATE_KEY, merge_shallow, state_of};
pub use error::{
    DispatchError, DispatchResult, RegistrationError, RegistrationResult, StoreError, StoreResult,
};
pub use request::{Application, Intent, Request, RequestEnvelope, Session, Slot, User};
pub use response::{
    Card, Image, OutputSpeech, Reprompt, Response, ResponseBuilder, ResponseEnvelope,
};
pub use store::{AttributeStore, BoxedAttributeStore, MemoryStore};

/// Prelude for common imports.
pub mod prelude {
    pub use super::attributes::{Attributes, STATE_KEY};
    pub use super::error::{DispatchError, RegistrationError, StoreError};
    pub use super::request::{Request, RequestEnvelope, Session};
    pub use super::response::{ResponseBuilder, ResponseEnvelope};
    pub use super::store::{AttributeStore, BoxedAttributeStore, MemoryStore};
}
