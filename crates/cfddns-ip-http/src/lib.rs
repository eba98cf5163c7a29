// # HTTP IP Sources
//
// Public IP discovery through JSON "what is my IP" services.
//
// ## Sources
//
// | Name       | URL                                 | Field     |
// |------------|-------------------------------------|-----------|
// | `ipify`    | https://api.ipify.org?format=json   | `ip`      |
// | `ip-api`   | http://ip-api.com/json/             | `query`   |
// | `ipinfo`   | https://ipinfo.io/json              | `ip`      |
// | `ident.me` | https://ident.me/.json              | `address` |
//
// ## Resolution
//
// `HttpIpResolver` picks one source uniformly at random per call and issues
// a single GET. There is no fallback to another source and no caching; a
// failed call surfaces as an error and the scheduler tries again on its
// next tick.

use cfddns_core::traits::{IpObservation, IpResolver, IpSource};
use cfddns_core::{Error, Result};

use rand::Rng;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Request timeout for IP sources
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// An IP source answering with a JSON object
///
/// The address is read from a single top-level string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonIpSource {
    name: String,
    url: String,
    field: String,
}

impl JsonIpSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            field: field.into(),
        }
    }

    pub fn ipify() -> Self {
        Self::new("ipify", "https://api.ipify.org?format=json", "ip")
    }

    pub fn ip_api() -> Self {
        Self::new("ip-api", "http://ip-api.com/json/", "query")
    }

    pub fn ipinfo() -> Self {
        Self::new("ipinfo", "https://ipinfo.io/json", "ip")
    }

    pub fn ident_me() -> Self {
        Self::new("ident.me", "https://ident.me/.json", "address")
    }

    /// Point this source at another URL, keeping its name and field
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl IpSource for JsonIpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn parse(&self, body: &[u8]) -> Result<String> {
        let json: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| Error::parse(&self.name, format!("Invalid JSON: {}", e)))?;

        let raw = json
            .get(&self.field)
            .and_then(|value| value.as_str())
            .ok_or_else(|| Error::parse(&self.name, format!("Missing field '{}'", self.field)))?;

        let raw = raw.trim();
        raw.parse::<IpAddr>()
            .map_err(|_| Error::parse(&self.name, format!("Invalid IP address: {}", raw)))?;

        Ok(raw.to_string())
    }
}

/// All built-in sources
pub fn default_sources() -> Vec<Arc<dyn IpSource>> {
    vec![
        Arc::new(JsonIpSource::ipify()),
        Arc::new(JsonIpSource::ip_api()),
        Arc::new(JsonIpSource::ipinfo()),
        Arc::new(JsonIpSource::ident_me()),
    ]
}

/// Resolves the public IP through one randomly chosen source per call
pub struct HttpIpResolver {
    sources: Vec<Arc<dyn IpSource>>,
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver over `sources`
    ///
    /// Fails with a configuration error when `sources` is empty.
    pub fn new(sources: Vec<Arc<dyn IpSource>>) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::config("At least one IP source is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { sources, client })
    }

    /// Resolver over the built-in sources
    pub fn with_default_sources() -> Result<Self> {
        Self::new(default_sources())
    }

    pub fn sources(&self) -> &[Arc<dyn IpSource>] {
        &self.sources
    }

    fn pick(&self) -> &Arc<dyn IpSource> {
        let mut rng = rand::thread_rng();
        &self.sources[rng.gen_range(0..self.sources.len())]
    }

    /// Query one specific source
    pub async fn fetch(&self, source: &dyn IpSource) -> Result<IpObservation> {
        let name = source.name();
        debug!(source = name, url = source.url(), "Querying IP source");

        let response = self
            .client
            .get(source.url())
            .send()
            .await
            .map_err(|e| Error::network(name, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(name, format!("HTTP error: {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(name, format!("Failed to read response: {}", e)))?;

        let ip = source.parse(&body)?;
        Ok(IpObservation::new(ip, name))
    }
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<IpObservation> {
        let source = self.pick().clone();
        self.fetch(source.as_ref()).await
    }
}
