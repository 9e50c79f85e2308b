//! Session attributes and the reserved dispatch-state key.

use serde_json::{Map, Value};
use tracing::warn;

/// The attribute mapping carried by a session and persisted between requests.
pub type Attributes = Map<String, Value>;

/// Attribute key under which the dispatch state is stored.
///
/// Integrators must not use this key for their own data.
pub const STATE_KEY: &str = "STATE";

/// Reads the dispatch state out of an attribute mapping.
///
/// Numbers and booleans are read as their text form. `null`, arrays and
/// objects are treated as "no state".
pub fn state_of(attributes: &Attributes) -> Option<String> {
    match attributes.get(STATE_KEY)? {
        Value::String(state) => Some(state.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => {
            warn!(state = %other, "Ignoring non-scalar dispatch state");
            None
        }
    }
}

/// Merges `fetched` into `target`, top level only.
///
/// Keys present in both mappings take the fetched value; nested objects are
/// replaced, not merged.
pub fn merge_shallow(target: &mut Attributes, fetched: Attributes) {
    for (key, value) in fetched {
        target.insert(key, value);
    }
}
