//! Shutdown coordination.

use tokio::sync::watch;

/// Coordinator for graceful shutdown. Long-running tasks hold a
/// [`ShutdownSignal`] and select on [`ShutdownSignal::recv`].
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// One task's view of the shutdown state.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Flips the shutdown flag; every subscriber wakes up.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown is triggered. Cancel-safe.
    pub async fn recv(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_wakes_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        shutdown.trigger();
        a.recv().await;
        b.recv().await;
    }

    #[tokio::test]
    async fn subscribing_after_trigger_resolves_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.subscribe().recv().await;
    }
}
