use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::IpObservation;

/// Last IP observation accepted by the scheduler
///
/// Written by the scheduler on every change, read by the administration
/// surface when it needs content for address records.
#[derive(Debug, Clone, Default)]
pub struct CurrentIp {
    inner: Arc<RwLock<Option<IpObservation>>>,
}

impl CurrentIp {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<IpObservation> {
        self.inner.read().await.clone()
    }

    pub async fn set(&self, observation: IpObservation) {
        *self.inner.write().await = Some(observation);
    }
}
