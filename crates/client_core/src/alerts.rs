//! One-shot expiry timers for sudden-acceleration alerts.

use std::{collections::HashMap, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};

pub const ALERT_DURATION: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlertId(pub u64);

/// Independent timers keyed by alert id. An expired id is delivered on the
/// receiver returned from [`AlertTimers::new`]; the owner removes the alert.
pub struct AlertTimers {
    timeout: Duration,
    pending: HashMap<AlertId, JoinHandle<()>>,
    expired_tx: mpsc::UnboundedSender<AlertId>,
}

impl AlertTimers {
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<AlertId>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                timeout,
                pending: HashMap::new(),
                expired_tx,
            },
            expired_rx,
        )
    }

    pub fn schedule(&mut self, id: AlertId) {
        let expired_tx = self.expired_tx.clone();
        let timeout = self.timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = expired_tx.send(id);
        });
        if let Some(previous) = self.pending.insert(id, handle) {
            previous.abort();
        }
    }

    /// Forgets the timer for an id whose expiry was delivered.
    pub fn complete(&mut self, id: AlertId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
        cancelled
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for AlertTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
#[path = "tests/alerts_tests.rs"]
mod tests;
