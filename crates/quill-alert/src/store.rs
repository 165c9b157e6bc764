#![forbid(unsafe_code)]

//! Process-wide alert store.
//!
//! [`AlertStore`] is a cloneable handle over an append-only log of alerts.
//! Producers [`dispatch`](AlertStore::dispatch) actions; consumers either
//! read a snapshot with [`alerts`](AlertStore::alerts) or
//! [`subscribe`](AlertStore::subscribe) to receive every alert dispatched
//! after subscription. Subscribers whose receiver was dropped are pruned on
//! the next dispatch.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::alert::Alert;

/// Actions accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertAction {
    /// Show a new alert.
    AlertSent(Alert),
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<Alert>,
    subscribers: Vec<Sender<Alert>>,
}

impl Inner {
    fn reduce(&mut self, action: AlertAction) {
        match action {
            AlertAction::AlertSent(alert) => {
                self.subscribers.retain(|tx| tx.send(alert.clone()).is_ok());
                self.log.push(alert);
            }
        }
    }
}

/// Shared, internally synchronized alert store.
#[derive(Debug, Clone, Default)]
pub struct AlertStore {
    inner: Arc<Mutex<Inner>>,
}

impl AlertStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `action` and notify subscribers.
    pub fn dispatch(&self, action: AlertAction) {
        let mut inner = self.lock();
        let AlertAction::AlertSent(alert) = &action;
        tracing::debug!(
            level = %alert.level,
            message = %alert.message,
            subscribers = inner.subscribers.len(),
            "alert dispatched"
        );
        inner.reduce(action);
    }

    /// Snapshot of every alert dispatched so far, oldest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.lock().log.clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Alert> {
        self.lock().log.last().cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().log.is_empty()
    }

    /// Receive every alert dispatched from now on.
    #[must_use]
    pub fn subscribe(&self) -> AlertReceiver {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        AlertReceiver { rx }
    }

    /// Number of live subscribers as of the last dispatch.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Receiving end of [`AlertStore::subscribe`].
#[derive(Debug)]
pub struct AlertReceiver {
    rx: Receiver<Alert>,
}

impl AlertReceiver {
    /// Next alert if one is already queued.
    pub fn try_next(&self) -> Option<Alert> {
        self.rx.try_recv().ok()
    }

    /// Every queued alert.
    pub fn drain(&self) -> Vec<Alert> {
        self.rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next alert.
    ///
    /// Returns `None` on timeout, or once the store and all its handles are
    /// gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Alert> {
        match self.rx.recv_timeout(timeout) {
            Ok(alert) => Some(alert),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}
