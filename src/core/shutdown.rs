//! Process-wide cancellation signal.
//!
//! A single [`ShutdownTrigger`] fans out to any number of [`Shutdown`]
//! listeners: the accept loop, every connection and every pending publish.
//! Dropping the trigger without firing it counts as shutdown too.

use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Creates a connected trigger/listener pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Raises the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the signal has been raised or the trigger dropped.
    pub async fn triggered(&mut self) {
        // Err means the trigger is gone, which is shutdown as well.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

/// Fires `trigger` on Ctrl+C or, on unix, SIGTERM.
pub async fn trigger_on_signal(trigger: ShutdownTrigger) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received SIGINT (Ctrl+C)");
    }

    trigger.trigger();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_every_listener() {
        let (trigger, mut first) = channel();
        let mut second = trigger.subscribe();
        assert!(!first.is_triggered());

        trigger.trigger();
        first.triggered().await;
        second.triggered().await;
        assert!(second.is_triggered());
    }

    #[tokio::test]
    async fn dropped_trigger_counts_as_shutdown() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        tokio::time::timeout(Duration::from_secs(1), shutdown.triggered())
            .await
            .expect("listener should resolve once the trigger is gone");
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn listener_cloned_after_trigger_sees_it() {
        let (trigger, shutdown) = channel();
        trigger.trigger();
        let mut late = shutdown.clone();
        assert!(late.is_triggered());
        late.triggered().await;
    }
}
