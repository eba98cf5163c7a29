// # Record Store
//
// In-memory snapshot of the remote records this process has created or
// updated, for display through the administration surface.
//
// ## Scope
//
// - Written by the engine after successful mutations only
// - Never consulted when deciding what a pass should do
// - Lost on restart; the next pass repopulates it

use std::collections::BTreeMap;
use std::sync::Arc;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::traits::RemoteRecord;

/// A remote record together with the zone it was written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub zone_name: String,
    #[serde(flatten)]
    pub record: RemoteRecord,
}

/// Shared, lock-guarded record snapshot keyed by remote record ID
///
/// Cloning is cheap and every clone sees the same data. HTTP handlers take
/// read locks; the engine takes short write locks after each mutation.
///
/// # Example
///
/// ```rust
/// use cfddns_core::state::RecordStore;
/// use cfddns_core::traits::RemoteRecord;
///
/// # tokio_test::block_on(async {
/// let store = RecordStore::new();
/// store.upsert("example.com", RemoteRecord {
///     id: "abc".into(),
///     name: "home.example.com".into(),
///     record_type: "A".into(),
///     content: "1.2.3.4".into(),
///     proxied: false,
///     ttl: 1,
///     created_at: None,
///     modified_at: None,
/// }).await;
/// assert_eq!(store.len().await, 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    inner: Arc<RwLock<BTreeMap<String, StoredRecord>>>,
}

impl RecordStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub async fn upsert(&self, zone_name: &str, record: RemoteRecord) {
        let mut inner = self.inner.write().await;
        inner.insert(
            record.id.clone(),
            StoredRecord {
                zone_name: zone_name.to_string(),
                record,
            },
        );
    }

    /// Remove a record by ID, returning it if present
    pub async fn remove(&self, record_id: &str) -> Option<StoredRecord> {
        self.inner.write().await.remove(record_id)
    }

    /// Find stored records by exact name
    pub async fn find_by_name(&self, name: &str) -> Vec<StoredRecord> {
        self.inner
            .read()
            .await
            .values()
            .filter(|stored| stored.record.name == name)
            .cloned()
            .collect()
    }

    /// All stored records, ordered by ID
    pub async fn snapshot(&self) -> Vec<StoredRecord> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
