// # cfddns-core
//
// Core library for keeping a set of DNS records pointed at the caller's
// current public IP.
//
// ## Architecture Overview
//
// - **IpResolver**: Obtains the current public IP from one of several sources
// - **DnsProviderClient**: Zone lookup, record listing, create, update, delete
// - **ReconciliationEngine**: Converges the provider towards the desired records
// - **Scheduler**: Polls the IP, detects change, triggers passes, serves reloads
// - **RecordStore**: Snapshot of written records for the administration surface
//
// ## Design Principles
//
// 1. **Core-first**: Decision logic lives here; the daemon only wires things up
// 2. **Failure isolation**: One record's failure never affects another
// 3. **Immutable snapshots**: Reloads swap whole record sets, never edit them
// 4. **Library-first**: Everything the daemon does can be driven from tests

pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod shutdown;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{DesiredRecord, RecordOrigin, RecordType, SchedulerConfig};
pub use engine::{PassReport, ReconciliationAction, ReconciliationEngine};
pub use error::{Error, ProviderError, ProviderErrorKind, Result};
pub use scheduler::{Scheduler, SchedulerEvent, TickOutcome};
pub use shutdown::{ShutdownToken, ShutdownTrigger, shutdown_channel};
pub use state::{CurrentIp, DesiredRecordSet, RecordSetSlot, RecordStore};
pub use traits::{DnsProviderClient, IpObservation, IpResolver, IpSource, Notifier, RecordSource};
