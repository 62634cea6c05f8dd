//! # xds-server
//!
//! Delta xDS server for control planes.
//!
//! This crate turns per-node snapshots from `xds-cache` into delta
//! discovery streams:
//!
//! - [`XdsServer`] - the server handle, owning shared session state
//! - [`XdsServerBuilder`] - builder for configuring the server
//! - [`delta`] - subscription tracking, cross-type ordering, child resends
//!   and the per-stream session loop
//! - [`limiter`] - session admission and load shedding
//! - [`auth`] - start-of-session and periodic authorization
//! - Metrics through the `metrics` facade
//! - Graceful shutdown that sends clients elsewhere
//!
//! ## Example
//!
//! ```rust,ignore
//! use xds_server::XdsServerBuilder;
//! use xds_cache::ShardedCache;
//! use std::sync::Arc;
//!
//! let cache = Arc::new(ShardedCache::new());
//! let server = XdsServerBuilder::new()
//!     .cache(cache)
//!     .max_sessions(1000)
//!     .build()?;
//!
//! let ads = server.ads_service();
//! let responses = ads.open_session(requests, Some(token))?;
//! ```
//!
//! ## Graceful Shutdown
//!
//! ```rust,ignore
//! shutdown::wait_for_signal().await?;
//! server.shutdown().await;
//! ```
//!
//! Running sessions end with `RESOURCE_EXHAUSTED` and new ones are refused.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
mod builder;
mod config;
pub mod delta;
pub mod limiter;
pub mod metrics;
pub mod services;
pub mod shutdown;
mod stream;
pub mod utils;


pub use auth::{AllowAll, Authorizer, SessionIdentity, TokenAuthorizer};
pub use builder::XdsServerBuilder;
pub use config::{default_allow_empty, ServerConfig, MIN_RESPONSE_BUFFER};
pub use delta::{DeltaSession, SessionState, SubscriptionTracker};
pub use limiter::{SessionGuard, SessionLimiter};
pub use metrics::XdsMetrics;
pub use services::{AdsService, AggregatedDiscoveryService, ServiceState};
pub use shutdown::ShutdownController;
pub use stream::{StreamContext, StreamId, TypeTraffic};

use std::sync::Arc;

use tracing::info;
use xds_cache::ShardedCache;

/// The delta xDS server.
///
/// Cheap to share: every accessor hands out clones of shared handles.
#[derive(Debug)]
pub struct XdsServer {
    state: ServiceState,
}

impl XdsServer {
    /// Create a new builder for configuring the server.
    pub fn builder() -> XdsServerBuilder {
        XdsServerBuilder::new()
    }

    /// Get a reference to the cache.
    #[inline]
    pub fn cache(&self) -> &Arc<ShardedCache> {
        &self.state.cache
    }

    /// Get the server configuration.
    #[inline]
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Get the session limiter.
    #[inline]
    pub fn limiter(&self) -> &SessionLimiter {
        &self.state.limiter
    }

    /// Get the metrics instance.
    #[inline]
    pub fn metrics(&self) -> &XdsMetrics {
        &self.state.metrics
    }

    /// Get the shutdown controller.
    #[inline]
    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.state.shutdown
    }

    /// Create an ADS service bound to this server's state.
    pub fn ads_service(&self) -> AdsService {
        AdsService::new(self.state.clone())
    }

    /// Stop admitting sessions, end running ones and wait for them.
    ///
    /// Returns `true` if every session finished within the grace period.
    pub async fn shutdown(&self) -> bool {
        let grace_period = self.state.config.grace_period;
        info!(
            sessions = self.state.limiter.active_sessions(),
            grace_period = ?grace_period,
            "shutting down xDS server"
        );
        self.state.shutdown.shutdown(grace_period).await
    }
}
