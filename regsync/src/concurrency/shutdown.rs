use std::time::Duration;

use tokio::sync::watch;

/// Type alias to abstract a watch channel of `()`.
pub type SignalTx = watch::Sender<()>;

/// Type alias to abstract a watch channel of `()`.
pub type SignalRx = watch::Receiver<()>;

/// Sending half of a shutdown channel.
///
/// One shutdown channel backs both cancellation mechanisms of a mirror run:
/// the inventory hard deadline (a timer fires the signal) and the sync
/// pipeline's fail-fast admission (a failing task fires the signal so that
/// no new work is admitted).
#[derive(Debug, Clone)]
pub struct ShutdownTx(SignalTx);

impl ShutdownTx {
    pub fn wrap(tx: SignalTx) -> Self {
        Self(tx)
    }

    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

pub type ShutdownRx = SignalRx;

/// Creates a new shutdown channel pair.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx::wrap(tx), rx)
}

/// Creates a shutdown channel whose signal fires automatically once `timeout`
/// elapses.
///
/// Receivers cloned from the returned receiver observe the deadline at every
/// suspension point they select against, so no in-flight work outlives the
/// deadline by more than one step.
pub fn deadline_shutdown(timeout: Duration) -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = create_shutdown_channel();

    let timer_tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = timer_tx.shutdown();
    });

    (tx, rx)
}

/// Returns whether the shutdown signal has fired.
///
/// A dropped sender is treated as a shutdown, since no further signal can
/// ever arrive.
pub fn is_shutdown(rx: &ShutdownRx) -> bool {
    rx.has_changed().unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_signal_observed_by_clones() {
        let (tx, rx) = create_shutdown_channel();
        assert!(!is_shutdown(&rx));

        tx.shutdown().unwrap();

        // Clones taken after the signal fired still observe it, since they
        // inherit the version last seen by the receiver they were cloned from.
        let cloned = rx.clone();
        assert!(is_shutdown(&rx));
        assert!(is_shutdown(&cloned));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_after_timeout() {
        let (_tx, mut rx) = deadline_shutdown(Duration::from_secs(5));
        assert!(!is_shutdown(&rx));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(is_shutdown(&rx));
        rx.changed().await.unwrap();
    }
}
