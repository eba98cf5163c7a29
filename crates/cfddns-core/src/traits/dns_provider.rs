// # DNS Provider Client Trait
//
// Capability boundary to the remote DNS authority: zone lookup, exact-name
// record listing, create, update and delete.
//
// ## Implementations
//
// - Cloudflare: `cfddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::DnsProviderClient;
//
// async fn show(client: &dyn DnsProviderClient) -> anyhow::Result<()> {
//     let zone_id = client.resolve_zone("example.com").await?;
//     for record in client.list_records(&zone_id, "home.example.com").await? {
//         println!("{} {} {}", record.id, record.record_type, record.content);
//     }
//     Ok(())
// }
// ```

use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record as stored by the remote provider
///
/// The engine only ever holds point-in-time copies fetched during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// Fully qualified name
    pub name: String,
    /// Record type ("A", "CNAME", ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content (address or target)
    pub content: String,
    /// Proxied through the provider edge
    pub proxied: bool,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Creation time, if reported
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time, if reported
    pub modified_at: Option<DateTime<Utc>>,
}

/// What a create or update call should write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub proxied: bool,
    pub ttl: u32,
}

/// Client for a remote DNS authority
///
/// Every operation is independently failable with a [`ProviderError`].
///
/// # Thread Safety
///
/// Implementations are stateless per call (credentials aside) and must be
/// safe for concurrent independent invocations; the engine calls them from
/// one concurrent unit per desired record.
///
/// # Responsibilities
///
/// Providers translate calls to their API and classify failures. They do
/// not retry, back off, cache, or decide which action a record needs;
/// those belong to the reconciliation engine (and retries do not exist at
/// all: a failed record is re-attempted on the next pass).
#[async_trait]
pub trait DnsProviderClient: Send + Sync {
    /// Look up a zone ID by exact zone name
    ///
    /// Fails with `NotFound` if the zone does not exist for the
    /// authenticated account.
    async fn resolve_zone(&self, zone_name: &str) -> Result<String, ProviderError>;

    /// List records in a zone whose name matches `exact_name` exactly
    async fn list_records(
        &self,
        zone_id: &str,
        exact_name: &str,
    ) -> Result<Vec<RemoteRecord>, ProviderError>;

    /// Create a record
    async fn create_record(
        &self,
        zone_id: &str,
        spec: &RecordSpec,
    ) -> Result<RemoteRecord, ProviderError>;

    /// Overwrite an existing record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<RemoteRecord, ProviderError>;

    /// Delete a record
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ProviderError>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str;
}
