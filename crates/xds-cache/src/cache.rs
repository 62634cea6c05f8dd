//! Cache trait and ShardedCache implementation.
//!
//! The cache is the snapshot source for delta sessions: it stores one
//! snapshot per node and fans every replacement out to that node's watches.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};
use xds_core::NodeHash;

use crate::snapshot::Snapshot;
use crate::stats::CacheStats;
use crate::watch::{Watch, WatchId, WatchManager};

/// Trait for xDS snapshot caches.
pub trait Cache: Send + Sync {
    /// Get a snapshot for a node.
    fn get_snapshot(&self, node: NodeHash) -> Option<Arc<Snapshot>>;

    /// Replace the snapshot for a node.
    ///
    /// Every watch for this node observes the new snapshot.
    fn set_snapshot(&self, node: NodeHash, snapshot: Snapshot);

    /// Forget the snapshot for a node. Open watches stay open.
    fn clear_snapshot(&self, node: NodeHash);

    /// Open a watch for a node, seeded with its current snapshot.
    fn create_watch(&self, node: NodeHash) -> Watch;

    /// Cancel a single watch.
    fn cancel_watch(&self, watch_id: WatchId);

    /// Get the number of cached snapshots.
    fn snapshot_count(&self) -> usize;
}

/// A sharded snapshot cache using DashMap.
///
/// ## Important
///
/// All `DashMap` references are dropped before the watch manager is
/// touched, so no shard lock is ever held while notifying.
#[derive(Debug)]
pub struct ShardedCache {
    snapshots: DashMap<NodeHash, Arc<Snapshot>>,
    watches: WatchManager,
    stats: CacheStats,
}

impl Default for ShardedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedCache {
    /// Create a new sharded cache with default settings.
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a new sharded cache with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            snapshots: DashMap::with_capacity(capacity),
            watches: WatchManager::new(),
            stats: CacheStats::new(),
        }
    }

    /// Get the watch manager.
    #[inline]
    pub fn watches(&self) -> &WatchManager {
        &self.watches
    }

    /// Get cache statistics.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Remove a node entirely: its snapshot is dropped and every open watch
    /// for it is closed. Sessions of that node end as aborted.
    pub fn remove_node(&self, node: NodeHash) {
        self.clear_snapshot(node);
        let closed = self.watches.close_node(node);
        self.stats.record_watches_closed(closed);
    }

    /// Get all node hashes in the cache.
    pub fn nodes(&self) -> Vec<NodeHash> {
        self.snapshots.iter().map(|r| *r.key()).collect()
    }

    /// Check if a snapshot exists for a node.
    pub fn has_snapshot(&self, node: NodeHash) -> bool {
        self.snapshots.contains_key(&node)
    }
}

impl Cache for ShardedCache {
    fn get_snapshot(&self, node: NodeHash) -> Option<Arc<Snapshot>> {
        let result = self.snapshots.get(&node).map(|r| Arc::clone(&*r));

        if result.is_some() {
            self.stats.record_hit();
            trace!(node = %node, "cache hit");
        } else {
            self.stats.record_miss();
            trace!(node = %node, "cache miss");
        }

        result
    }

    fn set_snapshot(&self, node: NodeHash, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);

        self.snapshots.insert(node, Arc::clone(&snapshot));
        self.stats.record_set();

        debug!(
            node = %node,
            version = %snapshot.version(),
            resources = snapshot.total_resources(),
            "set snapshot"
        );

        let notified = self.watches.notify(node, snapshot);
        self.stats.record_notifications(notified);
    }

    fn clear_snapshot(&self, node: NodeHash) {
        if self.snapshots.remove(&node).is_some() {
            self.stats.record_clear();
            debug!(node = %node, "cleared snapshot");
        }
    }

    fn create_watch(&self, node: NodeHash) -> Watch {
        self.stats.record_watch_created();
        self.watches.create_watch(node, || {
            self.snapshots.get(&node).map(|r| Arc::clone(&*r))
        })
    }

    fn cancel_watch(&self, watch_id: WatchId) {
        self.watches.cancel_watch(watch_id);
    }

    fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }
}

/// Builder for creating a configured cache.
#[derive(Debug, Default)]
pub struct CacheBuilder {
    capacity: Option<usize>,
}

impl CacheBuilder {
    /// Create a new cache builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial node capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Build the cache.
    pub fn build(self) -> ShardedCache {
        ShardedCache::with_capacity(self.capacity.unwrap_or(64))
    }
}
