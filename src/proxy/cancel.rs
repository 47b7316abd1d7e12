//! Cancellation for resolution passes
//!
//! One [`CancellationSignal`] threads through every concurrent lookup of a
//! pass; the owner cancels through the matching [`CancellationSource`].

use tokio::sync::watch;

/// Create a connected source/signal pair
pub fn cancellation() -> (CancellationSource, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (CancellationSource { tx }, CancellationSignal { rx: Some(rx) })
}

/// Owner side; cancels all signals cloned from its pair
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: Some(self.tx.subscribe()),
        }
    }
}

/// Observer side, cheap to clone into concurrent tasks
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancellationSignal {
    /// A signal that is never cancelled
    pub fn none() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Wait until cancelled.
    ///
    /// Pends forever if the source is dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };

        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::none()
    }
}
