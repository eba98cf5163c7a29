//! Audit records for provider mutations
//!
//! Every successful create, update or delete produces one [`AuditRecord`].
//! It is logged on the `cfddns::audit` target and carried in the pass
//! report so callers and tests can observe exactly what was written.

use serde::Serialize;
use tracing::info;

use crate::traits::RemoteRecord;

/// Tracing target used for audit events
pub const AUDIT_TARGET: &str = "cfddns::audit";

/// Kind of mutation performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Structured record of one successful provider mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub change: ChangeKind,
    pub zone_name: String,
    /// The record as returned by the provider (for deletes, as last listed)
    pub record: RemoteRecord,
}

impl AuditRecord {
    pub fn new(change: ChangeKind, zone_name: impl Into<String>, record: RemoteRecord) -> Self {
        Self {
            change,
            zone_name: zone_name.into(),
            record,
        }
    }

    pub fn created(&self) -> bool {
        self.change == ChangeKind::Created
    }

    pub fn updated(&self) -> bool {
        self.change == ChangeKind::Updated
    }

    pub fn deleted(&self) -> bool {
        self.change == ChangeKind::Deleted
    }

    /// Write this record to the audit log
    pub fn emit(&self) {
        info!(
            target: AUDIT_TARGET,
            name = %self.record.name,
            zone = %self.zone_name,
            record_type = %self.record.record_type,
            content = %self.record.content,
            proxied = self.record.proxied,
            ttl = self.record.ttl,
            created = self.created(),
            updated = self.updated(),
            deleted = self.deleted(),
            "Record {}",
            self.change.as_str()
        );
    }
}
