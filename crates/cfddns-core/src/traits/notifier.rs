// # Notifier Trait
//
// Sink invoked by the scheduler whenever the public IP changes.

use super::IpObservation;
use async_trait::async_trait;
use tracing::info;

/// Receives IP change notifications
///
/// Failures are logged by the caller and never affect reconciliation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification about a newly observed IP
    async fn notify(
        &self,
        previous: Option<&str>,
        current: &IpObservation,
    ) -> Result<(), crate::Error>;
}

/// Notifier that only writes a log line
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        previous: Option<&str>,
        current: &IpObservation,
    ) -> Result<(), crate::Error> {
        info!(
            previous = previous.unwrap_or("none"),
            current = %current.value,
            source = %current.source,
            "External IP changed"
        );
        Ok(())
    }
}
