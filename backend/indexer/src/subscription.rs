//! In-process fan-out of newly indexed events.
//!
//! A [`Subscription`] watches a set of [`EventKind`]s and runs its refresh
//! callback whenever one of them arrives. It stops when cancelled, when
//! dropped, or when the bus's parent token is cancelled at shutdown.

use std::collections::HashSet;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{DaoEvent, EventKind};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DaoEvent>,
    shutdown: CancellationToken,
}

impl EventBus {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, shutdown)
    }

    pub fn with_capacity(capacity: usize, shutdown: CancellationToken) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, shutdown }
    }

    /// Fan an event out to every live subscription. Having none is fine.
    pub fn publish(&self, event: DaoEvent) {
        let kind = event.kind;
        if let Ok(n) = self.tx.send(event) {
            debug!("published {} to {n} subscriber(s)", kind.as_str());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Run `refresh` for every published event whose kind is in `kinds`.
    ///
    /// If the subscriber falls behind and events are dropped, `refresh` runs
    /// once more so the view never stays stale.
    pub fn subscribe<F>(&self, kinds: &[EventKind], refresh: F) -> Subscription
    where
        F: Fn() + Send + 'static,
    {
        let kinds: HashSet<EventKind> = kinds.iter().copied().collect();
        let mut rx = self.tx.subscribe();
        let token = self.shutdown.child_token();
        let stop = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) if kinds.contains(&ev.kind) => refresh(),
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("subscription lagged by {skipped} event(s), refreshing");
                            refresh();
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription { token }
    }
}

/// Handle to a running subscription. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
