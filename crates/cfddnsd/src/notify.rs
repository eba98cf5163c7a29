//! Webhook delivery of IP change notifications.

use async_trait::async_trait;
use cfddns_core::traits::{IpObservation, Notifier};
use cfddns_core::{Error, Result};
use serde::Serialize;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Payload<'a> {
    subject: &'a str,
    ip: &'a str,
    previous: Option<&'a str>,
    source: &'a str,
    observed_at: String,
}

/// POSTs a JSON payload to a webhook on every IP change
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    subject: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, subject: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| Error::init(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            subject: subject.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, previous: Option<&str>, current: &IpObservation) -> Result<()> {
        let payload = Payload {
            subject: &self.subject,
            ip: &current.value,
            previous,
            source: &current.source,
            observed_at: current.observed_at.to_rfc3339(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Other(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "Webhook returned HTTP {}",
                response.status()
            )));
        }

        tracing::info!(ip = %current.value, "IP change notification delivered");
        Ok(())
    }
}
