//! Reconciliation engine
//!
//! The ReconciliationEngine converges the remote provider towards the
//! desired record set for one IP observation:
//! - Resolving each record's content (CNAME target or current IP)
//! - Looking up the zone and the exact-name matches
//! - Creating, updating or deleting remote entries
//! - Emitting an audit record for every successful mutation
//!
//! ## Architecture
//!
//! ```text
//!                   ┌──────────────────────┐
//!  IpObservation ──▶│ ReconciliationEngine │◀── DesiredRecordSet
//!                   └──────────────────────┘
//!                              │ one future per record, joined
//!           ┌──────────────────┼──────────────────┐
//!           ▼                  ▼                  ▼
//!     ┌───────────┐      ┌───────────┐      ┌───────────┐
//!     │ record 1  │      │ record 2  │      │ record N  │
//!     └───────────┘      └───────────┘      └───────────┘
//!           │                  │                  │
//!           └──────────▶ DnsProviderClient ◀──────┘
//!                              │
//!                              ▼
//!                  RecordStore + audit log
//! ```
//!
//! ## Per-record flow
//!
//! 1. Resolve content; an invalid record is skipped with zero provider calls
//! 2. Resolve the zone; failure skips only this record
//! 3. List exact-name matches; failure skips only this record
//! 4. No match: create
//! 5. Each match: delete (delete mode, not kept) or update, always
//!
//! There are no retries. A failed record is attempted again on the next pass.

pub mod audit;
pub mod outcome;

pub use audit::{AuditRecord, ChangeKind};
pub use outcome::{
    ActionOutcome, PassReport, PassSummary, ReconciliationAction, RecordOutcome, SkipReason,
};

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::DesiredRecord;
use crate::error::{ProviderError, Result};
use crate::shutdown::ShutdownToken;
use crate::state::{DesiredRecordSet, RecordStore};
use crate::traits::{DnsProviderClient, IpObservation, RecordSpec, RemoteRecord};

/// Decide the actions for a record given the remote exact-name matches
///
/// An empty match list yields one `Create`. Otherwise every match yields a
/// `Delete` when `delete_mode` is on and the record is not kept, or an
/// `Update` in every other case, even if the remote entry already equals
/// `spec`.
pub fn plan_actions(
    record: &DesiredRecord,
    spec: &RecordSpec,
    existing: Vec<RemoteRecord>,
    delete_mode: bool,
) -> Vec<ReconciliationAction> {
    if existing.is_empty() {
        return vec![ReconciliationAction::Create(spec.clone())];
    }

    existing
        .into_iter()
        .map(|remote| {
            if delete_mode && !record.keep_after_delete {
                ReconciliationAction::Delete(remote)
            } else {
                ReconciliationAction::Update {
                    id: remote.id,
                    spec: spec.clone(),
                }
            }
        })
        .collect()
}

/// Converges remote DNS state towards the desired record set
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
///
/// ## Cancellation
///
/// The engine checks its [`ShutdownToken`] before every provider call. Once
/// shutdown is requested, records that still have calls to make report
/// [`SkipReason::Cancelled`]. Calls already in flight run to completion.
pub struct ReconciliationEngine {
    /// Remote DNS authority
    provider: Arc<dyn DnsProviderClient>,

    /// Snapshot of records written by this process
    store: RecordStore,

    /// Cooperative cancellation
    shutdown: ShutdownToken,
}

impl ReconciliationEngine {
    /// Create an engine with an empty store and no cancellation
    pub fn new(provider: Arc<dyn DnsProviderClient>) -> Self {
        Self {
            provider,
            store: RecordStore::new(),
            shutdown: ShutdownToken::never(),
        }
    }

    /// Share an existing record store
    pub fn with_store(mut self, store: RecordStore) -> Self {
        self.store = store;
        self
    }

    /// Observe a shutdown token
    pub fn with_shutdown(mut self, shutdown: ShutdownToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run one reconciliation pass
    ///
    /// All records are processed concurrently and joined before returning.
    /// A failure in one record never affects its siblings.
    ///
    /// # Returns
    ///
    /// One [`RecordOutcome`] per desired record, in declaration order
    pub async fn run(
        &self,
        observation: &IpObservation,
        records: &DesiredRecordSet,
        delete_mode: bool,
    ) -> PassReport {
        info!(
            ip = %observation.value,
            source = %observation.source,
            records = records.len(),
            delete_mode,
            provider = self.provider.provider_name(),
            "Starting reconciliation pass"
        );

        let outcomes = join_all(
            records
                .iter()
                .map(|record| self.reconcile_record(record, observation, delete_mode)),
        )
        .await;

        let report = PassReport {
            observation: observation.clone(),
            delete_mode,
            records: outcomes,
        };

        let summary = report.summary();
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Reconciliation pass complete"
        );

        report
    }

    async fn reconcile_record(
        &self,
        record: &DesiredRecord,
        observation: &IpObservation,
        delete_mode: bool,
    ) -> RecordOutcome {
        let mut outcome = RecordOutcome::new(&record.name, &record.zone_name);

        let content = match record.desired_content(Some(&observation.value)) {
            Ok(content) => content,
            Err(e) => {
                warn!(record = %record.name, zone = %record.zone_name, error = %e, "Skipping invalid record");
                outcome
                    .outcomes
                    .push(ActionOutcome::Skipped(SkipReason::Validation(e.to_string())));
                return outcome;
            }
        };

        if let Some(skipped) = self.cancelled_skip(record) {
            outcome.outcomes.push(skipped);
            return outcome;
        }

        let zone_id = match self.provider.resolve_zone(&record.zone_name).await {
            Ok(zone_id) => zone_id,
            Err(e) => {
                error!(record = %record.name, zone = %record.zone_name, error = %e, "Zone lookup failed");
                outcome
                    .outcomes
                    .push(ActionOutcome::Skipped(SkipReason::ProviderError(e)));
                return outcome;
            }
        };

        if let Some(skipped) = self.cancelled_skip(record) {
            outcome.outcomes.push(skipped);
            return outcome;
        }

        let existing = match self.provider.list_records(&zone_id, &record.name).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(record = %record.name, zone = %record.zone_name, error = %e, "Record listing failed");
                outcome
                    .outcomes
                    .push(ActionOutcome::Skipped(SkipReason::ProviderError(e)));
                return outcome;
            }
        };

        debug!(record = %record.name, matches = existing.len(), "Listed remote records");

        let spec = record.spec(content);
        for action in plan_actions(record, &spec, existing, delete_mode) {
            if let Some(skipped) = self.cancelled_skip(record) {
                outcome.outcomes.push(skipped);
                break;
            }
            outcome
                .outcomes
                .push(self.execute(&zone_id, &record.zone_name, action).await);
        }

        outcome
    }

    fn cancelled_skip(&self, record: &DesiredRecord) -> Option<ActionOutcome> {
        if self.shutdown.is_triggered() {
            debug!(record = %record.name, "Shutdown requested, not issuing further calls");
            Some(ActionOutcome::Skipped(SkipReason::Cancelled))
        } else {
            None
        }
    }

    async fn execute(
        &self,
        zone_id: &str,
        zone_name: &str,
        action: ReconciliationAction,
    ) -> ActionOutcome {
        let result = match &action {
            ReconciliationAction::Create(spec) => self.apply_create(zone_id, zone_name, spec).await,
            ReconciliationAction::Update { id, spec } => {
                self.apply_update(zone_id, zone_name, id, spec).await
            }
            ReconciliationAction::Delete(remote) => {
                self.apply_delete(zone_id, zone_name, remote).await
            }
        };

        match result {
            Ok(audit) => ActionOutcome::Applied { action, audit },
            Err(error) => {
                error!(
                    zone = %zone_name,
                    action = action.label(),
                    error = %error,
                    "Provider call failed"
                );
                ActionOutcome::Failed { action, error }
            }
        }
    }

    async fn apply_create(
        &self,
        zone_id: &str,
        zone_name: &str,
        spec: &RecordSpec,
    ) -> std::result::Result<AuditRecord, ProviderError> {
        let created = self.provider.create_record(zone_id, spec).await?;
        self.store.upsert(zone_name, created.clone()).await;
        Ok(self.audit(ChangeKind::Created, zone_name, created))
    }

    async fn apply_update(
        &self,
        zone_id: &str,
        zone_name: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> std::result::Result<AuditRecord, ProviderError> {
        let updated = self.provider.update_record(zone_id, record_id, spec).await?;
        self.store.upsert(zone_name, updated.clone()).await;
        Ok(self.audit(ChangeKind::Updated, zone_name, updated))
    }

    async fn apply_delete(
        &self,
        zone_id: &str,
        zone_name: &str,
        remote: &RemoteRecord,
    ) -> std::result::Result<AuditRecord, ProviderError> {
        self.provider.delete_record(zone_id, &remote.id).await?;
        self.store.remove(&remote.id).await;
        Ok(self.audit(ChangeKind::Deleted, zone_name, remote.clone()))
    }

    fn audit(&self, change: ChangeKind, zone_name: &str, record: RemoteRecord) -> AuditRecord {
        let audit = AuditRecord::new(change, zone_name, record);
        audit.emit();
        audit
    }

    /// Create a single record outside of a pass
    ///
    /// Address records need a known IP; pass `None` when none has been
    /// observed yet and a [`crate::Error::Validation`] is returned.
    pub async fn create_record(
        &self,
        record: &DesiredRecord,
        observation: Option<&IpObservation>,
    ) -> Result<RemoteRecord> {
        record.validate()?;
        let content = record.desired_content(observation.map(|o| o.value.as_str()))?;
        let zone_id = self.provider.resolve_zone(&record.zone_name).await?;
        let audit = self
            .apply_create(&zone_id, &record.zone_name, &record.spec(content))
            .await?;
        Ok(audit.record)
    }

    /// Update every exact-name match of a single record outside of a pass
    ///
    /// Fails with a `NotFound` provider error when nothing matches.
    pub async fn update_record(
        &self,
        record: &DesiredRecord,
        observation: Option<&IpObservation>,
    ) -> Result<Vec<RemoteRecord>> {
        record.validate()?;
        let content = record.desired_content(observation.map(|o| o.value.as_str()))?;
        let zone_id = self.provider.resolve_zone(&record.zone_name).await?;
        let existing = self.provider.list_records(&zone_id, &record.name).await?;
        if existing.is_empty() {
            return Err(ProviderError::not_found(format!("record not found: {}", record.name)).into());
        }

        let spec = record.spec(content);
        let mut updated = Vec::with_capacity(existing.len());
        for remote in existing {
            let audit = self
                .apply_update(&zone_id, &record.zone_name, &remote.id, &spec)
                .await?;
            updated.push(audit.record);
        }
        Ok(updated)
    }

    /// Delete every exact-name match of `record_name` in `zone_name`
    ///
    /// Fails with a `NotFound` provider error when nothing matches.
    pub async fn delete_record(
        &self,
        zone_name: &str,
        record_name: &str,
    ) -> Result<Vec<RemoteRecord>> {
        let zone_id = self.provider.resolve_zone(zone_name).await?;
        let existing = self.provider.list_records(&zone_id, record_name).await?;
        if existing.is_empty() {
            return Err(ProviderError::not_found(format!("record not found: {}", record_name)).into());
        }

        let mut deleted = Vec::with_capacity(existing.len());
        for remote in &existing {
            let audit = self.apply_delete(&zone_id, zone_name, remote).await?;
            deleted.push(audit.record);
        }
        Ok(deleted)
    }
}
