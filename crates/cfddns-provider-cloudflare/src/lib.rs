// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProviderClient`.
//
// ## Behavior
//
// - One HTTP request per trait call; no retries, no caching
// - HTTP timeout of 30 seconds
// - Non-success statuses are classified with `ProviderError::from_status`
// - A `success: false` envelope is a `ProviderError` of kind `Other`
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - Verify token: GET `/user/tokens/verify`
// - List zones: GET `/zones?name=...`
// - List DNS records: GET `/zones/:zone_id/dns_records?name=...&per_page=100`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Update DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::traits::{DnsProviderClient, RecordSpec, RemoteRecord};
use cfddns_core::{Error, ProviderError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page Cloudflare serves for DNS record listings
const RECORDS_PER_PAGE: u32 = 100;

/// v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

fn join_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    #[serde(default)]
    proxied: bool,
    ttl: u32,
    created_on: Option<DateTime<Utc>>,
    modified_on: Option<DateTime<Utc>>,
}

impl From<ApiRecord> for RemoteRecord {
    fn from(record: ApiRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            record_type: record.record_type,
            content: record.content,
            proxied: record.proxied,
            ttl: record.ttl,
            created_at: record.created_on,
            modified_at: record.modified_on,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenStatus {
    status: String,
}

/// Cloudflare DNS provider
///
/// Stateless apart from the HTTP client. Zone IDs are looked up on every
/// `resolve_zone` call.
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    ///
    /// # Errors
    ///
    /// [`Error::Init`] if the token is empty or the HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::init("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Use a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the token is valid and active
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /user/tokens/verify
    /// Authorization: Bearer <token>
    /// ```
    ///
    /// # Errors
    ///
    /// [`Error::Init`] on any failure, including an inactive token.
    pub async fn verify(&self) -> Result<()> {
        let url = format!("{}/user/tokens/verify", self.base_url);
        let token: TokenStatus = self
            .send(self.client.get(&url), "token verification")
            .await
            .map_err(|e| Error::init(format!("Cloudflare token verification failed: {}", e)))?;

        if token.status != "active" {
            return Err(Error::init(format!(
                "Cloudflare token is not active (status: {})",
                token.status
            )));
        }

        tracing::info!("Cloudflare API token verified");
        Ok(())
    }

    /// Issue one request and unwrap the v4 envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> std::result::Result<T, ProviderError> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::other(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::other(format!("{}: failed to read response: {}", context, e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Envelope<serde_json::Value>>(&text)
                .map(|envelope| join_errors(&envelope.errors))
                .unwrap_or_default();
            tracing::warn!(status = status.as_u16(), context, "Cloudflare API returned an error status");
            return Err(ProviderError::from_status(
                status.as_u16(),
                format!("{}: {} {}", context, status, detail).trim_end().to_string(),
            ));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(context, "Failed to parse Cloudflare response");
            ProviderError::other(format!("{}: invalid response: {}", context, e))
        })?;

        if !envelope.success {
            return Err(ProviderError::other(format!(
                "{}: Cloudflare API error: {}",
                context,
                join_errors(&envelope.errors)
            )));
        }

        envelope
            .result
            .ok_or_else(|| ProviderError::other(format!("{}: response has no result", context)))
    }
}

#[async_trait]
impl DnsProviderClient for CloudflareProvider {
    async fn resolve_zone(&self, zone_name: &str) -> std::result::Result<String, ProviderError> {
        // `?name=` with no value lists every zone on the account
        if zone_name.trim().is_empty() {
            return Err(ProviderError::not_found("Zone name is empty"));
        }

        tracing::debug!(zone = zone_name, "Looking up zone ID");

        let url = format!("{}/zones", self.base_url);
        let zones: Vec<Zone> = self
            .send(
                self.client.get(&url).query(&[("name", zone_name)]),
                "zone lookup",
            )
            .await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::not_found(format!("Zone not found: {}", zone_name)))?;

        tracing::debug!(zone = zone_name, zone_id = %zone.id, "Found zone ID");
        Ok(zone.id)
    }

    async fn list_records(
        &self,
        zone_id: &str,
        exact_name: &str,
    ) -> std::result::Result<Vec<RemoteRecord>, ProviderError> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let per_page = RECORDS_PER_PAGE.to_string();
        let records: Vec<ApiRecord> = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("name", exact_name), ("per_page", per_page.as_str())]),
                "record listing",
            )
            .await?;

        Ok(records
            .into_iter()
            .map(RemoteRecord::from)
            .filter(|record| record.name == exact_name)
            .collect())
    }

    async fn create_record(
        &self,
        zone_id: &str,
        spec: &RecordSpec,
    ) -> std::result::Result<RemoteRecord, ProviderError> {
        tracing::debug!(record = %spec.name, record_type = %spec.record_type, "Creating DNS record");

        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let created: ApiRecord = self
            .send(self.client.post(&url).json(spec), "record create")
            .await?;
        Ok(created.into())
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> std::result::Result<RemoteRecord, ProviderError> {
        tracing::debug!(record = %spec.name, record_id, "Updating DNS record");

        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);
        let updated: ApiRecord = self
            .send(self.client.put(&url).json(spec), "record update")
            .await?;
        Ok(updated.into())
    }

    async fn delete_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> std::result::Result<(), ProviderError> {
        tracing::debug!(record_id, "Deleting DNS record");

        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id);
        let deleted: DeletedRecord = self
            .send(self.client.delete(&url), "record delete")
            .await?;

        if deleted.id != record_id {
            tracing::warn!(record_id, deleted = %deleted.id, "Cloudflare deleted a different record ID");
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
