//! Cooperative cancellation shared by the operator and rover loops.

use std::sync::Arc;
use tokio::sync::watch;

/// Clonable shutdown handle
///
/// Loops check [`is_triggered`](Shutdown::is_triggered) between cycles or
/// wait on [`triggered`](Shutdown::triggered) while idle. Triggering is
/// sticky: once set it stays set.
///
/// # Examples
///
/// ```
/// use rover_teleop::shutdown::Shutdown;
///
/// let shutdown = Shutdown::new();
/// let handle = shutdown.clone();
/// assert!(!handle.is_triggered());
///
/// shutdown.trigger();
/// assert!(handle.is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Ask every loop holding a clone to stop
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns Ok
        let _ = rx.wait_for(|&stop| stop).await;
    }
}
