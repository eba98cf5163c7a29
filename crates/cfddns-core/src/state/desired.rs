// # Desired Record Set
//
// Immutable snapshot of the caller's declared records plus the slot that
// holds the active snapshot.
//
// A reload builds a complete new set and swaps the slot's pointer. Passes
// grab an `Arc` to the current set when they start, so a swap never shows
// up half-applied and never mutates a set a pass is still reading.

use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::DesiredRecord;

/// Ordered, immutable list of desired records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredRecordSet {
    records: Arc<[DesiredRecord]>,
}

impl DesiredRecordSet {
    pub fn new(records: Vec<DesiredRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

impl Deref for DesiredRecordSet {
    type Target = [DesiredRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl From<Vec<DesiredRecord>> for DesiredRecordSet {
    fn from(records: Vec<DesiredRecord>) -> Self {
        Self::new(records)
    }
}

/// Shared slot holding the active [`DesiredRecordSet`]
#[derive(Debug, Clone, Default)]
pub struct RecordSetSlot {
    inner: Arc<RwLock<DesiredRecordSet>>,
}

impl RecordSetSlot {
    pub fn new(initial: DesiredRecordSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// The set a pass should use; later swaps do not affect it
    pub async fn current(&self) -> DesiredRecordSet {
        self.inner.read().await.clone()
    }

    /// Replace the active set, returning the previous one
    pub async fn replace(&self, next: DesiredRecordSet) -> DesiredRecordSet {
        std::mem::replace(&mut *self.inner.write().await, next)
    }
}
