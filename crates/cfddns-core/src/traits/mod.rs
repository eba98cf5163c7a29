//! Core traits for cfddns
//!
//! This module defines the abstract interfaces the engine and scheduler are
//! written against.
//!
//! - [`IpSource`] / [`IpResolver`]: Obtain the current public IP
//! - [`DnsProviderClient`]: Talk to the remote DNS authority
//! - [`Notifier`]: Announce IP changes
//! - [`RecordSource`]: Load the desired record set

pub mod dns_provider;
pub mod ip_source;
pub mod notifier;
pub mod record_source;

pub use dns_provider::{DnsProviderClient, RecordSpec, RemoteRecord};
pub use ip_source::{IpObservation, IpResolver, IpSource};
pub use notifier::{LogNotifier, Notifier};
pub use record_source::{ConfigRecordSource, RecordSource};
