//! Latched "projectors calibrated" status.
//!
//! A `watch` channel holds the last published value, so late readers (the
//! HTTP endpoint, subscribers that attach after startup) always see it.
//! `None` means nothing has been published yet.

use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
pub struct StatusPublisher {
    tx: watch::Sender<Option<bool>>,
}

impl StatusPublisher {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, calibrated: bool) {
        self.tx.send_replace(Some(calibrated));
        info!(calibrated, "status: projectors_calibrated published");
    }

    #[must_use]
    pub fn current(&self) -> Option<bool> {
        *self.tx.borrow()
    }

    #[cfg(test)]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.tx.subscribe()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
