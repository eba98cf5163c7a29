//! Actions and outcomes of a reconciliation pass

use serde::Serialize;

use super::audit::{AuditRecord, ChangeKind};
use crate::error::ProviderError;
use crate::traits::{IpObservation, RecordSpec, RemoteRecord};

/// What the engine decided to do for one (desired record, remote entry) pair
///
/// Skips are not planned actions. A record that is invalid, whose zone or
/// listing failed, or that was cut short by shutdown never reaches
/// [`plan_actions`](super::plan_actions); it is reported as
/// [`ActionOutcome::Skipped`] with a [`SkipReason`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationAction {
    /// No remote entry exists; create one
    Create(RecordSpec),
    /// Overwrite an existing remote entry
    Update { id: String, spec: RecordSpec },
    /// Remove an existing remote entry
    Delete(RemoteRecord),
}

impl ReconciliationAction {
    /// Stable lowercase label, used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update { .. } => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// Why a record was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The record itself is unusable (e.g., CNAME without target)
    Validation(String),
    /// Zone lookup or listing failed
    ProviderError(ProviderError),
    /// Shutdown was requested before the next call could be issued
    Cancelled,
}

/// Result of carrying out one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied {
        action: ReconciliationAction,
        audit: AuditRecord,
    },
    Failed {
        action: ReconciliationAction,
        error: ProviderError,
    },
    Skipped(SkipReason),
}

impl ActionOutcome {
    fn change(&self) -> Option<ChangeKind> {
        match self {
            Self::Applied { audit, .. } => Some(audit.change),
            _ => None,
        }
    }
}

/// Everything that happened to one desired record during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub name: String,
    pub zone_name: String,
    pub outcomes: Vec<ActionOutcome>,
}

impl RecordOutcome {
    pub fn new(name: impl Into<String>, zone_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone_name: zone_name.into(),
            outcomes: Vec::new(),
        }
    }

    fn count_changes(&self, kind: ChangeKind) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.change() == Some(kind))
            .count()
    }

    pub fn created(&self) -> usize {
        self.count_changes(ChangeKind::Created)
    }

    pub fn updated(&self) -> usize {
        self.count_changes(ChangeKind::Updated)
    }

    pub fn deleted(&self) -> usize {
        self.count_changes(ChangeKind::Deleted)
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ActionOutcome::Failed { .. }))
            .count()
    }

    /// The first skip reason recorded for this record, if any
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        self.outcomes.iter().find_map(|outcome| match outcome {
            ActionOutcome::Skipped(reason) => Some(reason),
            _ => None,
        })
    }

    /// Audit records of all successful mutations
    pub fn audits(&self) -> impl Iterator<Item = &AuditRecord> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ActionOutcome::Applied { audit, .. } => Some(audit),
            _ => None,
        })
    }
}

/// Counts for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub records: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-record outcomes of one reconciliation pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub observation: IpObservation,
    pub delete_mode: bool,
    /// One entry per desired record, in declaration order
    pub records: Vec<RecordOutcome>,
}

impl PassReport {
    pub fn summary(&self) -> PassSummary {
        self.records
            .iter()
            .fold(PassSummary::default(), |mut summary, record| {
                summary.records += 1;
                summary.created += record.created();
                summary.updated += record.updated();
                summary.deleted += record.deleted();
                summary.failed += record.failed();
                if record.skip_reason().is_some() {
                    summary.skipped += 1;
                }
                summary
            })
    }

    /// Outcome for a record by name
    pub fn record(&self, name: &str) -> Option<&RecordOutcome> {
        self.records.iter().find(|record| record.name == name)
    }
}
