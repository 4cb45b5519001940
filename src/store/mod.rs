//! Append-only snapshot history.
//!
//! The simulation never mutates a stored snapshot; it reads the newest one to
//! derive the battery state, reads the current local day to total production,
//! and appends exactly one new record per tick.

pub mod firestore;
pub mod json_lines;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StoreConfig;
use crate::models::energy::EnergySnapshot;

pub use firestore::FirestoreStore;
pub use json_lines::JsonLinesStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {body}")]
    Status { status: reqwest::StatusCode, body: String },
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("malformed record: {0}")]
    Decode(String),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Newest snapshot by timestamp, `None` when the history is empty.
    async fn latest(&self) -> Result<Option<EnergySnapshot>, StoreError>;

    /// Every snapshot with `timestamp >= from`, oldest first.
    async fn since(&self, from: DateTime<Utc>) -> Result<Vec<EnergySnapshot>, StoreError>;

    /// Persists one snapshot. Either the whole record is written or nothing is.
    async fn append(&self, snapshot: &EnergySnapshot) -> Result<(), StoreError>;
}

pub fn open_store(cfg: &StoreConfig) -> Result<Box<dyn SnapshotStore>, StoreError> {
    let store: Box<dyn SnapshotStore> = match cfg {
        StoreConfig::JsonLines(c) => Box::new(JsonLinesStore::new(&c.path)),
        StoreConfig::Firestore(c) => Box::new(FirestoreStore::new(c)?),
    };
    Ok(store)
}
