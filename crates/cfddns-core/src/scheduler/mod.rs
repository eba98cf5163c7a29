//! Polling scheduler
//!
//! The Scheduler drives reconciliation from a fixed-interval timer:
//!
//! ```text
//!   Idle ──tick──▶ ResolveIP ──ok──▶ DetectChange ──changed──▶ Reconcile ──▶ Idle
//!                     │                   │
//!                     └──error──▶ Idle    └──unchanged──▶ Idle
//! ```
//!
//! One unconditional pass runs before the timer starts. While idle the
//! control loop also serves reload requests (atomic swap of the desired
//! record set) and termination (shared [`ShutdownToken`]).
//!
//! ## Termination
//!
//! Shutdown is observed between loop turns. A pass already running is
//! allowed to drain: the engine stops issuing new provider calls as soon
//! as the token fires, and calls in flight finish or hit the client
//! timeout. The loop then exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::engine::{PassReport, PassSummary, ReconciliationEngine};
use crate::error::{Error, Result};
use crate::shutdown::ShutdownToken;
use crate::state::{CurrentIp, RecordSetSlot};
use crate::traits::{IpObservation, IpResolver, LogNotifier, Notifier, RecordSource};

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Control loop started
    Started { records: usize },

    /// IP resolution failed; no pass was run
    ResolveFailed { error: String },

    /// IP matched the last known value; no pass was run
    IpUnchanged { ip: String },

    /// A new IP was accepted
    IpChanged {
        previous: Option<String>,
        current: String,
    },

    /// A reconciliation pass finished
    PassCompleted(PassSummary),

    /// Desired records were swapped
    Reloaded { records: usize },

    /// Reload failed; the previous records stay active
    ReloadFailed { error: String },

    /// Control loop stopped
    Stopped { reason: String },
}

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// The resolver failed; the scheduler stays idle until the next tick
    ResolveFailed(Error),
    /// The IP did not change; the engine was not invoked
    Unchanged,
    /// A pass ran
    Reconciled(PassReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            Self::Reconciled(report) => Some(report),
            _ => None,
        }
    }
}

/// Polling loop with change detection
pub struct Scheduler {
    /// Public IP resolver
    resolver: Arc<dyn IpResolver>,

    /// Engine invoked on change
    engine: Arc<ReconciliationEngine>,

    /// Where reloads read records from
    source: Arc<dyn RecordSource>,

    /// Active desired record set
    records: RecordSetSlot,

    /// Sink for IP change notifications
    notifier: Arc<dyn Notifier>,

    /// Published copy of the last accepted observation
    current_ip: CurrentIp,

    config: SchedulerConfig,

    /// Last IP that triggered a pass
    last_known_ip: Option<String>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields
    /// scheduler events. Dropping the receiver is fine; events are then
    /// discarded.
    pub fn new(
        resolver: Arc<dyn IpResolver>,
        engine: Arc<ReconciliationEngine>,
        source: Arc<dyn RecordSource>,
        records: RecordSetSlot,
        config: SchedulerConfig,
    ) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let scheduler = Self {
            resolver,
            engine,
            source,
            records,
            notifier: Arc::new(LogNotifier),
            current_ip: CurrentIp::new(),
            config,
            last_known_ip: None,
            event_tx: tx,
        };

        (scheduler, rx)
    }

    /// Use a notification sink other than the log
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Publish accepted observations through an existing handle
    pub fn with_current_ip(mut self, current_ip: CurrentIp) -> Self {
        self.current_ip = current_ip;
        self
    }

    /// Seed the last known IP
    pub fn with_last_known_ip(mut self, ip: impl Into<String>) -> Self {
        self.last_known_ip = Some(ip.into());
        self
    }

    pub fn last_known_ip(&self) -> Option<&str> {
        self.last_known_ip.as_deref()
    }

    pub fn current_ip(&self) -> CurrentIp {
        self.current_ip.clone()
    }

    pub fn records(&self) -> RecordSetSlot {
        self.records.clone()
    }

    /// Run the control loop until `shutdown` fires
    ///
    /// Each `()` received on `reload_rx` re-loads the desired records.
    pub async fn run(mut self, mut reload_rx: mpsc::Receiver<()>, shutdown: ShutdownToken) {
        let records = self.records.current().await.len();
        info!(
            records,
            interval_secs = self.config.poll_interval.as_secs(),
            delete_mode = self.config.delete_mode,
            "Scheduler started"
        );
        self.emit_event(SchedulerEvent::Started { records });

        if !shutdown.is_triggered() {
            self.bootstrap().await;
        }

        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.triggered() => {
                    info!("Termination requested, stopping scheduler");
                    break;
                }

                Some(()) = reload_rx.recv() => {
                    // Failure is logged and reported as an event
                    let _ = self.reload().await;
                }

                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.emit_event(SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
    }

    /// The initial pass, run regardless of the last known IP
    pub async fn bootstrap(&mut self) -> TickOutcome {
        debug!("Running bootstrap pass");
        let observation = match self.resolve().await {
            Ok(observation) => observation,
            Err(e) => return TickOutcome::ResolveFailed(e),
        };

        if self.is_change(&observation) {
            return self.accept(observation).await;
        }

        self.current_ip.set(observation.clone()).await;
        TickOutcome::Reconciled(self.reconcile(&observation, self.config.delete_mode).await)
    }

    /// One timer tick: resolve, detect change, maybe reconcile
    pub async fn tick(&mut self) -> TickOutcome {
        let observation = match self.resolve().await {
            Ok(observation) => observation,
            Err(e) => return TickOutcome::ResolveFailed(e),
        };

        if !self.is_change(&observation) {
            debug!(ip = %observation.value, "IP unchanged, skipping pass");
            self.emit_event(SchedulerEvent::IpUnchanged {
                ip: observation.value,
            });
            return TickOutcome::Unchanged;
        }

        self.accept(observation).await
    }

    /// Resolve once and run a single pass, without notifying
    ///
    /// Used by the one-shot run modes.
    pub async fn run_once(&mut self, delete_mode: bool) -> Result<PassReport> {
        let observation = self.resolve().await?;
        self.last_known_ip = Some(observation.value.clone());
        self.current_ip.set(observation.clone()).await;
        Ok(self.reconcile(&observation, delete_mode).await)
    }

    /// Re-load desired records and swap them in for later passes
    ///
    /// On failure the previous set stays active.
    pub async fn reload(&self) -> Result<usize> {
        match self.source.load() {
            Ok(records) => {
                let count = records.len();
                self.records.replace(records.into()).await;
                info!(records = count, "Desired records reloaded");
                self.emit_event(SchedulerEvent::Reloaded { records: count });
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "Reload failed, keeping previous records");
                self.emit_event(SchedulerEvent::ReloadFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn resolve(&self) -> Result<IpObservation> {
        match self.resolver.resolve().await {
            Ok(observation) => Ok(observation),
            Err(e) => {
                warn!(error = %e, "IP resolution failed, waiting for next tick");
                self.emit_event(SchedulerEvent::ResolveFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn is_change(&self, observation: &IpObservation) -> bool {
        !observation.value.is_empty()
            && self.last_known_ip.as_deref() != Some(observation.value.as_str())
    }

    async fn accept(&mut self, observation: IpObservation) -> TickOutcome {
        let previous = self.last_known_ip.replace(observation.value.clone());
        self.current_ip.set(observation.clone()).await;

        info!(
            previous = previous.as_deref().unwrap_or("none"),
            current = %observation.value,
            source = %observation.source,
            "Public IP changed"
        );
        self.emit_event(SchedulerEvent::IpChanged {
            previous: previous.clone(),
            current: observation.value.clone(),
        });

        if let Err(e) = self.notifier.notify(previous.as_deref(), &observation).await {
            warn!(error = %e, "Notification failed");
        }

        TickOutcome::Reconciled(self.reconcile(&observation, self.config.delete_mode).await)
    }

    async fn reconcile(&self, observation: &IpObservation, delete_mode: bool) -> PassReport {
        let records = self.records.current().await;
        let report = self.engine.run(observation, &records, delete_mode).await;
        self.emit_event(SchedulerEvent::PassCompleted(report.summary()));
        report
    }

    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Scheduler event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
