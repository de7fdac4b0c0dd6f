// Cancellation Token
//
// A token fires when any of its sources is cancelled. A source dropped without
// cancelling never fires.

use futures::future::select_all;
use tokio::sync::watch;

/// Cancellation signal passed into every bounded wait
#[derive(Clone, Debug)]
pub struct CancelToken {
    receivers: Vec<watch::Receiver<bool>>,
}

impl CancelToken {
    /// Token that is never cancelled
    pub fn never() -> Self {
        Self {
            receivers: Vec::new(),
        }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.receivers.iter().any(|rx| *rx.borrow())
    }

    /// Wait for cancellation
    pub async fn cancelled(&self) {
        if self.receivers.is_empty() {
            return std::future::pending().await;
        }
        let waits = self.receivers.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    /// Token that fires when either `self` or `other` fires
    pub fn joined(&self, other: &CancelToken) -> CancelToken {
        let mut receivers = self.receivers.clone();
        receivers.extend(other.receivers.iter().cloned());
        CancelToken { receivers }
    }
}

/// Cancellation sender
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal cancellation to every token derived from this source
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            receivers: vec![self.tx.subscribe()],
        }
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a cancellation channel
pub fn cancel_channel() -> (CancelSource, CancelToken) {
    let source = CancelSource::new();
    let token = source.token();
    (source, token)
}
