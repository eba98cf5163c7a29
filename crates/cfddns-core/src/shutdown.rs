//! Cooperative cancellation
//!
//! A [`ShutdownTrigger`] flips a shared flag once; every [`ShutdownToken`]
//! observes it. The engine checks the token before issuing provider calls
//! and the scheduler awaits it in its control loop. Calls already in flight
//! are never aborted.

use std::sync::Arc;
use tokio::sync::watch;

/// Create a connected trigger/token pair
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx: Arc::new(tx) }, ShutdownToken { rx })
}

/// Requests termination
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Request shutdown; calling it again has no further effect
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// A new token observing this trigger
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a [`ShutdownTrigger`]
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// A token that is never triggered
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested
    ///
    /// If every trigger is dropped without firing, this never completes.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|triggered| *triggered).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
