//! Watch system for snapshot update notifications.
//!
//! The watch system provides:
//! - Unique watch identifiers ([`WatchId`])
//! - Watch subscriptions ([`Watch`]) that always observe the latest snapshot
//! - Watch management ([`WatchManager`]) for fan-out and cancellation
//!
//! Each watch is backed by a `tokio::sync::watch` channel. Intermediate
//! snapshots are coalesced: a slow session skips straight to the newest one
//! instead of replaying every version it missed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, trace, warn};
use xds_core::NodeHash;

use crate::snapshot::SharedSnapshot;

/// Unique identifier for a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric value of this watch ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// A watch subscription for receiving snapshot updates.
///
/// The watch ends (`recv` returns `None`) when it is cancelled through the
/// [`WatchManager`] or the manager is dropped.
#[derive(Debug)]
pub struct Watch {
    id: WatchId,
    node_hash: NodeHash,
    receiver: watch::Receiver<Option<SharedSnapshot>>,
}

impl Watch {
    /// Get the unique identifier for this watch.
    #[inline]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Get the node hash this watch is subscribed to.
    #[inline]
    pub fn node_hash(&self) -> NodeHash {
        self.node_hash
    }

    /// Wait for a snapshot newer than the last one returned.
    ///
    /// Returns `None` once the watch has been cancelled.
    pub async fn recv(&mut self) -> Option<SharedSnapshot> {
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            if let Some(snapshot) = self.receiver.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// The most recent snapshot delivered to this watch, if any.
    pub fn latest(&self) -> Option<SharedSnapshot> {
        self.receiver.borrow().clone()
    }
}

#[derive(Debug)]
struct WatchSender {
    id: WatchId,
    sender: watch::Sender<Option<SharedSnapshot>>,
}

/// Manager for watch subscriptions.
///
/// Holds the sending half of every live watch, grouped by node. The lock
/// is never held across an await point.
#[derive(Debug, Default)]
pub struct WatchManager {
    watches: Mutex<HashMap<NodeHash, Vec<WatchSender>>>,
}

impl WatchManager {
    /// Create a new watch manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NodeHash, Vec<WatchSender>>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a new watch for a node.
    ///
    /// `current` is read while the manager lock is held, so a snapshot set
    /// concurrently is either returned by `current` or delivered by the next
    /// [`WatchManager::notify`]; it is never lost.
    pub fn create_watch(
        &self,
        node_hash: NodeHash,
        current: impl FnOnce() -> Option<SharedSnapshot>,
    ) -> Watch {
        let id = WatchId::next();
        let (sender, receiver) = watch::channel(None);

        {
            let mut watches = self.lock();
            if let Some(snapshot) = current() {
                sender.send_replace(Some(snapshot));
            }
            watches
                .entry(node_hash)
                .or_default()
                .push(WatchSender { id, sender });
        }

        debug!(watch_id = %id, node = %node_hash, "created watch");

        Watch {
            id,
            node_hash,
            receiver,
        }
    }

    /// Cancel a watch subscription.
    ///
    /// The watch's `recv` returns `None` from then on.
    pub fn cancel_watch(&self, watch_id: WatchId) {
        let mut watches = self.lock();

        for senders in watches.values_mut() {
            if let Some(pos) = senders.iter().position(|s| s.id == watch_id) {
                senders.swap_remove(pos);
                debug!(watch_id = %watch_id, "cancelled watch");
                return;
            }
        }

        warn!(watch_id = %watch_id, "attempted to cancel unknown watch");
    }

    /// Cancel every watch for a node. Returns how many were closed.
    pub fn close_node(&self, node_hash: NodeHash) -> usize {
        let closed = self.lock().remove(&node_hash).map_or(0, |v| v.len());
        if closed > 0 {
            debug!(node = %node_hash, count = closed, "closed node watches");
        }
        closed
    }

    /// Publish a snapshot to every watch of a node.
    ///
    /// Watches whose receiver was dropped are removed. Returns how many
    /// watches were notified.
    pub fn notify(&self, node_hash: NodeHash, snapshot: SharedSnapshot) -> usize {
        let mut watches = self.lock();
        let Some(senders) = watches.get_mut(&node_hash) else {
            return 0;
        };

        senders.retain(|s| {
            if s.sender.is_closed() {
                trace!(watch_id = %s.id, "dropping closed watch");
                return false;
            }
            s.sender.send_replace(Some(snapshot.clone()));
            true
        });
        let notified = senders.len();
        if senders.is_empty() {
            watches.remove(&node_hash);
        }

        trace!(node = %node_hash, watch_count = notified, "notified watches of snapshot update");
        notified
    }

    /// Get the number of active watches for a node.
    pub fn watch_count(&self, node_hash: NodeHash) -> usize {
        self.lock().get(&node_hash).map_or(0, |v| v.len())
    }

    /// Get the total number of active watches across all nodes.
    pub fn total_watch_count(&self) -> usize {
        self.lock().values().map(|v| v.len()).sum()
    }
}
