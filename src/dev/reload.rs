//! Reload signal shared by the watch loop and the HTTP server.
//!
//! A monotonic generation counter behind a `tokio::sync::watch` channel.
//! Browsers long-poll for a generation different from the one they last
//! saw. The boot id changes every time the process starts, so a browser that
//! reconnects after a restart can tell it is talking to a new server.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

#[derive(Clone)]
pub struct LiveReload {
    boot: Arc<str>,
    tx: Arc<watch::Sender<u64>>,
}

impl LiveReload {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let (tx, _rx) = watch::channel(0);
        Self {
            boot: format!("{nanos:x}").into(),
            tx: Arc::new(tx),
        }
    }

    /// Tell every connected browser to reload. Works with no subscribers.
    pub fn reload(&self) {
        self.tx.send_modify(|generation| *generation += 1);
        tracing::debug!(generation = *self.tx.borrow(), "reload signalled");
    }

    pub fn generation(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn boot(&self) -> &str {
        &self.boot
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}
