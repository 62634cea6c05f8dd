//! # xds-cache
//!
//! Snapshot source and snapshot indexing for the delta xDS engine.
//!
//! This crate provides:
//!
//! - [`ShardedCache`] - DashMap-based concurrent cache of per-node snapshots
//! - [`Snapshot`] - Immutable collection of resources for a node
//! - [`Watch`] - Latest-value subscription to a node's snapshots
//! - [`ResourceIndexer`] - Content versions for every resource in a snapshot
//! - [`DependencyIndexer`] - Parent/child links between resource kinds
//! - [`IndexedSnapshot`] - A snapshot bundled with its versions and links
//!
//! ## Key Design Decisions
//!
//! - Uses `DashMap` for concurrent access across nodes
//! - All `DashMap` references are dropped before watches are notified
//! - Snapshots are immutable and atomically replaced
//! - Watches coalesce: a session always wakes up to the newest snapshot
//!
//! ## Example
//!
//! ```rust
//! use xds_cache::{Cache, ResourceIndexer, ShardedCache, Snapshot};
//! use xds_core::{AnyResource, NodeHash, ResourceType};
//!
//! let cache = ShardedCache::new();
//! let node = NodeHash::from_id("node-1");
//!
//! let snapshot = Snapshot::builder()
//!     .version("v1")
//!     .resource(AnyResource::from_bytes(ResourceType::Cluster, "db", vec![1]).boxed())
//!     .build();
//! cache.set_snapshot(node, snapshot);
//!
//! let versions = ResourceIndexer::compute(&cache.get_snapshot(node).unwrap()).unwrap();
//! assert!(versions[ResourceType::Cluster].contains_key("db"));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
pub mod dependency;
pub mod index;
mod snapshot;
mod stats;
mod watch;

pub use cache::{Cache, CacheBuilder, ShardedCache};
pub use dependency::{ChildIndex, ChildRelation, DependencyIndexer, CHILD_RELATIONS};
pub use index::{IndexedSnapshot, ResourceIndexer, VersionMap};
pub use snapshot::{SharedSnapshot, Snapshot, SnapshotBuilder, SnapshotResources};
pub use stats::CacheStats;
pub use watch::{Watch, WatchId, WatchManager};
