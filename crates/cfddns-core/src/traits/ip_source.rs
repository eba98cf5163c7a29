// # IP Source Traits
//
// Defines how the current public IP address is obtained.
//
// - `IpSource`: one named endpoint that knows its URL and how to pull the
//   address out of a response body. Pure, no I/O.
// - `IpResolver`: performs the network round trip and produces an
//   `IpObservation`.
//
// ## Implementations
//
// - JSON sources and `HttpIpResolver`: `cfddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::IpResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* IpResolver implementation */;
//
//     let observation = resolver.resolve().await?;
//     println!("{} (via {})", observation.value, observation.source);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One answer from an IP source
///
/// Produced fresh by every resolver call and never reused across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpObservation {
    /// The address as reported by the source
    pub value: String,
    /// Name of the source that answered
    pub source: String,
    /// When the answer was received
    pub observed_at: DateTime<Utc>,
}

impl IpObservation {
    /// Create an observation stamped with the current time
    pub fn new(value: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source: source.into(),
            observed_at: Utc::now(),
        }
    }
}

/// A named endpoint that reports the caller's public IP
///
/// Implementations are small values: a name, a URL and a parser for the
/// response body. They never perform I/O themselves.
pub trait IpSource: Send + Sync {
    /// Stable name used in logs and observations
    fn name(&self) -> &str;

    /// URL to issue a GET against
    fn url(&self) -> &str;

    /// Extract the IP string from a response body
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The address, validated as IPv4 or IPv6
    /// - `Err(Error::Parse)`: Body is malformed or lacks the expected field
    fn parse(&self, body: &[u8]) -> Result<String, crate::Error>;
}

/// Obtains the current public IP address
///
/// Every call is a new network round trip; there is no caching and no
/// fallback across sources. Pacing is the scheduler's job.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public IP
    ///
    /// # Returns
    ///
    /// - `Ok(IpObservation)`: A fresh observation
    /// - `Err(Error::Network)`: Transport failure or non-success status
    /// - `Err(Error::Parse)`: Response body could not be parsed
    async fn resolve(&self) -> Result<IpObservation, crate::Error>;
}
