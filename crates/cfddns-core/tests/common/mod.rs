//! Test doubles and common utilities for contract tests
//!
//! These doubles record every call they receive so tests can assert on
//! exactly which provider operations a pass issued.

#![allow(dead_code)]

use async_trait::async_trait;
use cfddns_core::config::{DesiredRecord, SchedulerConfig};
use cfddns_core::error::{Error, ProviderError};
use cfddns_core::shutdown::ShutdownTrigger;
use cfddns_core::state::RecordSetSlot;
use cfddns_core::traits::{
    DnsProviderClient, IpObservation, IpResolver, Notifier, RecordSource, RecordSpec, RemoteRecord,
};
use cfddns_core::{ReconciliationEngine, Scheduler, SchedulerEvent};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One call received by [`MockProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ResolveZone(String),
    List { zone_id: String, name: String },
    Create { zone_id: String, spec: RecordSpec },
    Update { zone_id: String, id: String, spec: RecordSpec },
    Delete { zone_id: String, id: String },
}

/// In-memory provider that records every call
///
/// Zone IDs are `zone-<zone name>`. Remote records can be seeded per zone.
#[derive(Default)]
pub struct MockProvider {
    calls: Mutex<Vec<ProviderCall>>,
    remote: Mutex<HashMap<String, Vec<RemoteRecord>>>,
    failing_zones: Mutex<HashSet<String>>,
    failing_lists: Mutex<HashSet<String>>,
    failing_mutations: Mutex<HashSet<String>>,
    list_delay: Mutex<Option<Duration>>,
    trigger_on_list: Mutex<Option<ShutdownTrigger>>,
    next_id: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn zone_id(zone_name: &str) -> String {
        format!("zone-{}", zone_name)
    }

    /// Seed a remote record in a zone
    pub fn seed(&self, zone_name: &str, record: RemoteRecord) {
        self.remote
            .lock()
            .unwrap()
            .entry(Self::zone_id(zone_name))
            .or_default()
            .push(record);
    }

    /// Make `resolve_zone` fail with NotFound for this zone
    pub fn fail_zone(&self, zone_name: &str) {
        self.failing_zones.lock().unwrap().insert(zone_name.to_string());
    }

    /// Make `list_records` fail for this record name
    pub fn fail_list(&self, name: &str) {
        self.failing_lists.lock().unwrap().insert(name.to_string());
    }

    /// Make create/update/delete fail for this record name
    pub fn fail_mutations(&self, name: &str) {
        self.failing_mutations.lock().unwrap().insert(name.to_string());
    }

    /// Delay every `list_records` call
    pub fn delay_lists(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    /// Fire a shutdown trigger when the first list call arrives
    pub fn trigger_on_list(&self, trigger: ShutdownTrigger) {
        *self.trigger_on_list.lock().unwrap() = Some(trigger);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn creates(&self) -> Vec<RecordSpec> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Create { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<(String, RecordSpec)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Update { id, spec, .. } => Some((id, spec)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::Delete { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn listed_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::List { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_mutation(&self, name: &str) -> Result<(), ProviderError> {
        if self.failing_mutations.lock().unwrap().contains(name) {
            return Err(ProviderError::other(format!("mutation rejected for {}", name)));
        }
        Ok(())
    }

    fn name_of(&self, zone_id: &str, record_id: &str) -> String {
        self.remote
            .lock()
            .unwrap()
            .get(zone_id)
            .and_then(|records| records.iter().find(|r| r.id == record_id))
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }
}

fn from_spec(id: String, spec: &RecordSpec) -> RemoteRecord {
    RemoteRecord {
        id,
        name: spec.name.clone(),
        record_type: spec.record_type.clone(),
        content: spec.content.clone(),
        proxied: spec.proxied,
        ttl: spec.ttl,
        created_at: None,
        modified_at: None,
    }
}

#[async_trait]
impl DnsProviderClient for MockProvider {
    async fn resolve_zone(&self, zone_name: &str) -> Result<String, ProviderError> {
        self.record(ProviderCall::ResolveZone(zone_name.to_string()));
        if self.failing_zones.lock().unwrap().contains(zone_name) {
            return Err(ProviderError::not_found(format!("zone {} not found", zone_name)));
        }
        Ok(Self::zone_id(zone_name))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        exact_name: &str,
    ) -> Result<Vec<RemoteRecord>, ProviderError> {
        self.record(ProviderCall::List {
            zone_id: zone_id.to_string(),
            name: exact_name.to_string(),
        });

        if let Some(trigger) = self.trigger_on_list.lock().unwrap().take() {
            trigger.trigger();
        }

        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_lists.lock().unwrap().contains(exact_name) {
            return Err(ProviderError::rate_limited("slow down"));
        }

        Ok(self
            .remote
            .lock()
            .unwrap()
            .get(zone_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.name == exact_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_record(
        &self,
        zone_id: &str,
        spec: &RecordSpec,
    ) -> Result<RemoteRecord, ProviderError> {
        self.record(ProviderCall::Create {
            zone_id: zone_id.to_string(),
            spec: spec.clone(),
        });
        self.check_mutation(&spec.name)?;

        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created = from_spec(id, spec);
        self.remote
            .lock()
            .unwrap()
            .entry(zone_id.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<RemoteRecord, ProviderError> {
        self.record(ProviderCall::Update {
            zone_id: zone_id.to_string(),
            id: record_id.to_string(),
            spec: spec.clone(),
        });
        self.check_mutation(&spec.name)?;
        Ok(from_spec(record_id.to_string(), spec))
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ProviderError> {
        self.record(ProviderCall::Delete {
            zone_id: zone_id.to_string(),
            id: record_id.to_string(),
        });
        let name = self.name_of(zone_id, record_id);
        self.check_mutation(&name)?;
        if let Some(records) = self.remote.lock().unwrap().get_mut(zone_id) {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Resolver that plays back a script of answers
///
/// Once the script is exhausted the final step repeats.
pub struct ScriptedResolver {
    steps: Mutex<VecDeque<Option<String>>>,
    last: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    /// `Some(ip)` answers with that IP, `None` fails with a network error
    pub fn new(steps: Vec<Option<&str>>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().map(|s| s.map(str::to_string)).collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always answer with `ip`
    pub fn fixed(ip: &str) -> Arc<Self> {
        Self::new(vec![Some(ip)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpResolver for ScriptedResolver {
    async fn resolve(&self) -> Result<IpObservation, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = {
            let mut steps = self.steps.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match steps.pop_front() {
                Some(step) => {
                    *last = step.clone();
                    step
                }
                None => last.clone(),
            }
        };

        match step {
            Some(ip) => Ok(IpObservation::new(ip, "scripted")),
            None => Err(Error::network("scripted", "connection refused")),
        }
    }
}

/// Notifier that counts deliveries
#[derive(Default)]
pub struct CountingNotifier {
    count: AtomicUsize,
    last: Mutex<Option<(Option<String>, String)>>,
    fail: bool,
}

impl CountingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A notifier that counts and then fails every delivery
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<(Option<String>, String)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, previous: Option<&str>, current: &IpObservation) -> Result<(), Error> {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((previous.map(str::to_string), current.value.clone()));
        if self.fail {
            return Err(Error::Other("smtp down".to_string()));
        }
        Ok(())
    }
}

/// Record source whose answer can be changed between loads
pub struct StaticRecordSource {
    records: Mutex<Option<Vec<DesiredRecord>>>,
    loads: AtomicUsize,
}

impl StaticRecordSource {
    pub fn new(records: Vec<DesiredRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Some(records)),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, records: Vec<DesiredRecord>) {
        *self.records.lock().unwrap() = Some(records);
    }

    /// Make the next loads fail with a config error
    pub fn break_source(&self) {
        *self.records.lock().unwrap() = None;
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl RecordSource for StaticRecordSource {
    fn load(&self) -> Result<Vec<DesiredRecord>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::config("records file is malformed"))
    }
}

pub fn a_record(name: &str, zone: &str) -> DesiredRecord {
    DesiredRecord::new(name, zone)
}

pub fn remote(id: &str, name: &str, content: &str) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        name: name.to_string(),
        record_type: "A".to_string(),
        content: content.to_string(),
        proxied: false,
        ttl: 1,
        created_at: None,
        modified_at: None,
    }
}

pub fn observation(ip: &str) -> IpObservation {
    IpObservation::new(ip, "test")
}

pub fn engine_for(provider: &Arc<MockProvider>) -> Arc<ReconciliationEngine> {
    Arc::new(ReconciliationEngine::new(provider.clone()))
}

/// Everything a scheduler test needs to inspect
pub struct SchedulerHarness {
    pub scheduler: Scheduler,
    pub events: mpsc::Receiver<SchedulerEvent>,
    pub provider: Arc<MockProvider>,
    pub resolver: Arc<ScriptedResolver>,
    pub notifier: Arc<CountingNotifier>,
    pub source: Arc<StaticRecordSource>,
    pub slot: RecordSetSlot,
}

pub fn scheduler_harness(
    resolver: Arc<ScriptedResolver>,
    records: Vec<DesiredRecord>,
    config: SchedulerConfig,
) -> SchedulerHarness {
    let provider = MockProvider::new();
    let notifier = CountingNotifier::new();
    let source = StaticRecordSource::new(records.clone());
    let slot = RecordSetSlot::new(records.into());

    let (scheduler, events) = Scheduler::new(
        resolver.clone(),
        engine_for(&provider),
        source.clone(),
        slot.clone(),
        config,
    );
    let scheduler = scheduler.with_notifier(notifier.clone());

    SchedulerHarness {
        scheduler,
        events,
        provider,
        resolver,
        notifier,
        source,
        slot,
    }
}

/// Drain whatever events are queued right now
pub fn drain_events(rx: &mut mpsc::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
