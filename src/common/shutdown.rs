//! Cooperative Shutdown
//!
//! A cloneable cancellation signal threaded through every await point of the
//! watcher and swap loops. Triggering it never interrupts an in-flight HTTP
//! call; loops observe it at their next sleep or poll boundary.

use std::time::Duration;
use tokio::sync::watch;

/// Returned by a wait that was interrupted by shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Sending half, owned by whoever decides to stop (signal handler, supervisor)
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal every linked [`Shutdown`]
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half, cloned into each loop
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a linked trigger/receiver pair
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// A signal that never fires
    pub fn never() -> Self {
        Self::channel().1
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Trigger dropped without firing
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep unless shutdown arrives first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.is_triggered() {
            return Err(Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes_without_trigger() {
        let shutdown = Shutdown::never();
        assert!(shutdown.sleep(Duration::from_millis(5)).await.is_ok());
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_interrupts_sleep() {
        let (trigger, shutdown) = Shutdown::channel();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.sleep(Duration::from_secs(60)).await });

        trigger.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sleep should be interrupted")
            .expect("task panicked");
        assert_eq!(result, Err(Cancelled));
        assert!(shutdown.is_triggered());
    }
}
