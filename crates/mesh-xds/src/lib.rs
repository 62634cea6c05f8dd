//! # mesh-xds
//!
//! Delta xDS configuration sync for Envoy control planes.
//!
//! Publish a [`Snapshot`](xds_cache::Snapshot) per node and the engine keeps
//! every connected proxy in sync over the delta Aggregated Discovery
//! Service:
//!
//! - Content-derived resource versions, so unchanged resources are never
//!   resent
//! - Wildcard and explicit subscriptions, ACK/NACK tracking and one
//!   in-flight response per type
//! - Safe cross-type ordering (clusters before endpoints before listeners
//!   and routes; removals in reverse)
//! - Child resends after a parent update is acknowledged
//! - Session admission, load shedding, authorization and graceful shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mesh_xds::prelude::*;
//!
//! let cache = Arc::new(ShardedCache::new());
//! cache.set_snapshot(
//!     NodeHash::from_id("node-1"),
//!     Snapshot::builder().version("v1").resources(resources).build(),
//! );
//!
//! let server = XdsServer::builder()
//!     .cache(cache)
//!     .max_sessions(1000)
//!     .build()?;
//! let responses = server.ads_service().open_session(requests, None)?;
//! ```
//!
//! ## Architecture
//!
//! - `xds-core` - resource kinds, versions, the resource trait and errors
//! - `xds-types` - the protobuf messages the engine reads and writes
//! - `xds-cache` - snapshot cache, watches, version and child indexing
//! - `xds-server` - delta sessions and everything around them
//!
//! This crate re-exports all public APIs for convenience.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use xds_cache as cache;
pub use xds_core as core;
pub use xds_server as server;
pub use xds_types as types;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use mesh_xds::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Core types
    pub use xds_core::{
        AnyResource, BoxResource, NodeHash, Resource, ResourceType, ResourceVersion, TypeMap,
        TypeUrl, XdsError, XdsResult,
    };

    // Cache types
    pub use xds_cache::{
        Cache, CacheStats, IndexedSnapshot, ShardedCache, SharedSnapshot, Snapshot,
        SnapshotBuilder, Watch, WatchId,
    };

    // Server types
    pub use xds_server::{
        AdsService, AggregatedDiscoveryService, AllowAll, Authorizer, ServerConfig,
        SessionIdentity, SessionLimiter, ShutdownController, TokenAuthorizer, XdsServer,
        XdsServerBuilder,
    };

    // Wire messages
    pub use xds_types::envoy::service::discovery::v3::{
        DeltaDiscoveryRequest, DeltaDiscoveryResponse,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("mesh-xds {} (MSRV {})", VERSION, MSRV)
    }
}
