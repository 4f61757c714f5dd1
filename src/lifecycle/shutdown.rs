//! Shutdown coordination for the server.
//!
//! A `Shutdown` latches: once triggered it stays triggered, so a
//! `ShutdownSignal` taken after the trigger resolves at once. Handles are
//! cheap clones of one shared flag, which lets the signal listener and the
//! server hold their own copy.

use std::sync::Arc;

use tokio::sync::watch;

/// Latching shutdown flag shared by every clone.
#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// A future-producing handle that resolves once shutdown is triggered.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.flag.subscribe(),
        }
    }

    /// Flip the flag. Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        let first = self
            .flag
            .send_if_modified(|fired| !std::mem::replace(fired, true));
        if first {
            tracing::debug!(waiting = self.flag.receiver_count(), "Shutdown triggered");
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

/// Receiving side of a [`Shutdown`].
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the trigger. Also returns when every `Shutdown` handle is
    /// gone, since nothing can trigger it any more.
    pub async fn recv(mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}
