//! File-backed attribute store.
//!
//! Each table is one JSON document under the base directory, mapping user
//! ids to their attribute objects:
//!
//! ```text
//! <base_dir>/<table>.json
//! { "amzn1.ask.account.A": { "STATE": "Guessing", "gamesPlayed": 3 } }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use skillkit_core::{AttributeStore, Attributes, StoreError, StoreResult};

/// An [`AttributeStore`] persisting tables as JSON files.
///
/// Writes are serialized through one lock so concurrent saves to the same
/// table never interleave. Table names must be plain file stems.
#[derive(Debug)]
pub struct JsonFileStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store rooted at `base_dir`, creating the directory.
    pub async fn open(base_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        tokio::fs::create_dir_all(&base_dir).await?;
        debug!(base_dir = %base_dir.display(), "Opened JSON file store");
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the directory holding the table files.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn table_path(&self, table: &str) -> StoreResult<PathBuf> {
        if table.is_empty() || table.contains(['/', '\\']) || table.starts_with('.') {
            return Err(StoreError::backend(format!("invalid table name: {table:?}")));
        }
        Ok(self.base_dir.join(format!("{table}.json")))
    }

    async fn read_table(path: &Path) -> StoreResult<Map<String, Value>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes)? {
                Value::Object(records) => Ok(records),
                _ => Err(StoreError::Serialization(format!(
                    "{} does not hold a JSON object",
                    path.display()
                ))),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl AttributeStore for JsonFileStore {
    async fn get(&self, table: &str, user_id: &str) -> StoreResult<Attributes> {
        let path = self.table_path(table)?;
        let mut records = Self::read_table(&path).await?;
        trace!(table, user_id, "Reading attributes");

        match records.remove(user_id) {
            Some(Value::Object(attributes)) => Ok(attributes),
            Some(_) => Err(StoreError::Serialization(format!(
                "record for '{user_id}' in table '{table}' is not an object"
            ))),
            None => Ok(Attributes::new()),
        }
    }

    async fn put(&self, table: &str, user_id: &str, attributes: &Attributes) -> StoreResult<()> {
        let path = self.table_path(table)?;
        let _guard = self.write_lock.lock().await;

        let mut records = Self::read_table(&path).await?;
        records.insert(user_id.to_string(), Value::Object(attributes.clone()));

        let bytes = serde_json::to_vec_pretty(&records)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;

        trace!(table, user_id, "Wrote attributes");
        Ok(())
    }
}
